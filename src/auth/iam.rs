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

//! IAM authentication via an API key or a refresh token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::token_manager::{TokenIssuer, TokenManager};
use super::{default_http_client, AuthenticationType, Authenticator};
use crate::error::{Error, Result};
use crate::request::RequestBuilder;
use crate::token::TokenData;

pub(crate) const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

pub(crate) enum IamCredential {
    ApiKey(String),
    RefreshToken(String),
}

pub(crate) struct ClientAuth {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
}

pub(crate) struct IamInner {
    pub(crate) url: String,
    pub(crate) credential: IamCredential,
    pub(crate) client_auth: Option<ClientAuth>,
    pub(crate) scope: Option<String>,
    pub(crate) client: reqwest::Client,
    pub(crate) manager: TokenManager,
}

/// Authenticates via IBM Cloud IAM, exchanging an API key or a refresh
/// token for an access token at `<url>/identity/token`.
pub struct IamAuthenticator {
    pub(crate) inner: Arc<IamInner>,
}

impl IamAuthenticator {
    /// Build an IAM authenticator from an API key.
    pub fn from_api_key(
        apikey: impl Into<String>,
        url: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        scope: Option<String>,
        disable_ssl_verification: bool,
    ) -> Result<IamAuthenticator> {
        let apikey = apikey.into();
        if apikey.is_empty() {
            return Err(Error::validation("apikey is required for IAM authentication"));
        }
        Self::build(IamCredential::ApiKey(apikey), url, client_id, client_secret, scope, disable_ssl_verification)
    }

    /// Build an IAM authenticator from a refresh token.
    pub fn from_refresh_token(
        refresh_token: impl Into<String>,
        url: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        scope: Option<String>,
        disable_ssl_verification: bool,
    ) -> Result<IamAuthenticator> {
        let refresh_token = refresh_token.into();
        if refresh_token.is_empty() {
            return Err(Error::validation("refresh_token is required for IAM authentication"));
        }
        Self::build(
            IamCredential::RefreshToken(refresh_token),
            url,
            client_id,
            client_secret,
            scope,
            disable_ssl_verification,
        )
    }

    fn build(
        credential: IamCredential,
        url: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        scope: Option<String>,
        disable_ssl_verification: bool,
    ) -> Result<IamAuthenticator> {
        let client_auth = match (client_id, client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(ClientAuth { client_id: id, client_secret: secret }),
            (None, None) => None,
            _ => return Err(Error::validation("client_id and client_secret must be set together, or not at all")),
        };

        Ok(IamAuthenticator {
            inner: Arc::new(IamInner {
                url: url.unwrap_or_else(|| DEFAULT_IAM_URL.to_string()).trim_end_matches('/').to_string(),
                credential,
                client_auth,
                scope,
                client: default_http_client(disable_ssl_verification),
                manager: TokenManager::new(),
            }),
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct IamTokenResponse {
    pub(crate) access_token: String,
    pub(crate) expires_in: i64,
    pub(crate) expiration: i64,
}

pub(crate) fn token_from_response(response: IamTokenResponse) -> Result<TokenData> {
    let expiration = DateTime::from_timestamp(response.expiration, 0)
        .ok_or_else(|| Error::validation("identity endpoint returned an invalid expiration timestamp"))?;
    TokenData::new(response.access_token, response.expires_in, expiration)
}

#[async_trait::async_trait]
impl TokenIssuer for IamInner {
    async fn issue_token(&self) -> Result<TokenData> {
        let mut form: Vec<(&str, &str)> = Vec::new();
        match &self.credential {
            IamCredential::ApiKey(key) => {
                form.push(("grant_type", "urn:ibm:params:oauth:grant-type:apikey"));
                form.push(("apikey", key));
                form.push(("response_type", "cloud_iam"));
            }
            IamCredential::RefreshToken(token) => {
                form.push(("grant_type", "refresh_token"));
                form.push(("refresh_token", token));
            }
        }
        if let Some(scope) = &self.scope {
            form.push(("scope", scope));
        }

        let mut request = self
            .client
            .post(format!("{}/identity/token", self.url))
            .header(http::header::ACCEPT, "application/json")
            .form(&form);
        if let Some(auth) = &self.client_auth {
            request = request.basic_auth(&auth.client_id, Some(&auth.client_secret));
        }

        let response = request.send().await.map_err(Error::from)?;
        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let raw = response.bytes().await.unwrap_or_default().to_vec();
            let detailed = crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw));
            return Err(Error::authentication_with_response(format!("IAM token request failed with status {status}"), detailed));
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
impl Authenticator for IamAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::Iam
    }

    fn validate(&self) -> Result<()> {
        if self.inner.url.is_empty() {
            return Err(Error::validation("IAM authenticator requires a url"));
        }
        Ok(())
    }

    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.inner.manager.get_token(self.inner.clone() as Arc<dyn TokenIssuer>).await?;
        request.add_header("Authorization", format!("Bearer {token}"))
    }
}
