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

//! IAM authentication via VPC instance metadata: a two-step exchange of an
//! instance identity token for an access token, optionally scoped to a
//! trusted profile.

use std::sync::Arc;

use serde::Deserialize;

use super::iam::{token_from_response, IamTokenResponse};
use super::token_manager::{TokenIssuer, TokenManager};
use super::{default_http_client, AuthenticationType, Authenticator};
use crate::error::{Error, Result};
use crate::request::RequestBuilder;
use crate::token::TokenData;

const DEFAULT_METADATA_URL: &str = "http://169.254.169.254";

enum TrustedProfile {
    None,
    Crn(String),
    Id(String),
}

struct VpcInner {
    url: String,
    profile: TrustedProfile,
    client: reqwest::Client,
    manager: TokenManager,
}

/// Authenticates via the VPC instance metadata service, without ever
/// leaving the instance's own network namespace.
pub struct VpcInstanceAuthenticator {
    inner: Arc<VpcInner>,
}

impl VpcInstanceAuthenticator {
    /// Build a VPC instance authenticator. At most one of `iam_profile_crn`/
    /// `iam_profile_id` may be set.
    pub fn new(iam_profile_crn: Option<String>, iam_profile_id: Option<String>, url: Option<String>) -> Result<VpcInstanceAuthenticator> {
        let profile = match (iam_profile_crn, iam_profile_id) {
            (Some(_), Some(_)) => {
                return Err(Error::validation("iam_profile_crn and iam_profile_id are mutually exclusive"));
            }
            (Some(crn), None) if !crn.is_empty() => TrustedProfile::Crn(crn),
            (None, Some(id)) if !id.is_empty() => TrustedProfile::Id(id),
            _ => TrustedProfile::None,
        };

        Ok(VpcInstanceAuthenticator {
            inner: Arc::new(VpcInner {
                url: url.unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()).trim_end_matches('/').to_string(),
                profile,
                client: default_http_client(false),
                manager: TokenManager::new(),
            }),
        })
    }
}

#[derive(Deserialize)]
struct InstanceIdentityTokenResponse {
    access_token: String,
}

impl VpcInner {
    fn metadata_url(&self) -> String {
        let version = chrono::Utc::now().format("%Y-%m-%d");
        format!("{}/instance_identity/v1/iam_token?version={version}", self.url)
    }

    async fn instance_identity_token(&self) -> Result<String> {
        let response = self
            .client
            .put(self.metadata_url())
            .header("Metadata-Flavor", "ibm")
            .header(http::header::ACCEPT, "application/json")
            .header(http::header::CONTENT_TYPE, "application/json")
            .json(&serde_json::json!({"expires_in": 300}))
            .send()
            .await
            .map_err(Error::from)?;

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let raw = response.bytes().await.unwrap_or_default().to_vec();
            let detailed = crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw));
            return Err(Error::authentication_with_response(
                format!("instance metadata service returned status {status} while requesting an identity token"),
                detailed,
            ));
        }

        let raw = response.bytes().await.map_err(Error::from)?.to_vec();
        serde_json::from_slice::<InstanceIdentityTokenResponse>(&raw)
            .map(|r| r.access_token)
            .map_err(|e| {
                Error::authentication_with_response(
                    format!("malformed instance identity token response: {e}"),
                    crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw)),
                )
            })
    }
}

#[async_trait::async_trait]
impl TokenIssuer for VpcInner {
    async fn issue_token(&self) -> Result<TokenData> {
        let identity_token = self.instance_identity_token().await?;

        let body = match &self.profile {
            TrustedProfile::None => serde_json::json!({}),
            TrustedProfile::Crn(crn) => serde_json::json!({"trusted_profile": {"crn": crn}}),
            TrustedProfile::Id(id) => serde_json::json!({"trusted_profile": {"id": id}}),
        };

        let response = self
            .client
            .post(self.metadata_url())
            .bearer_auth(&identity_token)
            .json(&body)
            .send()
            .await
            .map_err(Error::from)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let raw = response.bytes().await.unwrap_or_default().to_vec();
            let detailed = crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw));
            return Err(Error::authentication_with_response(
                format!("VPC trusted-profile token exchange failed with status {status}"),
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
impl Authenticator for VpcInstanceAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::Vpc
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.inner.manager.get_token(self.inner.clone() as Arc<dyn TokenIssuer>).await?;
        request.add_header("Authorization", format!("Bearer {token}"))
    }
}
