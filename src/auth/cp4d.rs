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

//! Cloud Pak for Data authentication.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::token_manager::{TokenIssuer, TokenManager};
use super::{default_http_client, AuthenticationType, Authenticator};
use crate::error::{Error, Result};
use crate::request::RequestBuilder;
use crate::token::TokenData;

/// The CP4D server does not report `expires_in`; this is the value assumed
/// when the token is not a JWT carrying `exp`/`iat` claims of its own.
///
/// Decided open question: a JWT's own `exp`/`iat` claims take precedence over
/// this default whenever the token is a well-formed JWT, since that is the
/// more precise of the two sources; the default only applies to opaque
/// (non-JWT) tokens.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

enum Credential {
    Password(String),
    ApiKey(String),
}

struct Cp4dInner {
    url: String,
    username: String,
    credential: Credential,
    headers: Vec<(String, String)>,
    client: reqwest::Client,
    manager: TokenManager,
}

/// Authenticates against a Cloud Pak for Data deployment's `/v1/authorize`
/// endpoint and caches the resulting token like the IAM variants do.
pub struct Cp4dAuthenticator {
    inner: Arc<Cp4dInner>,
}

impl Cp4dAuthenticator {
    /// Build a CP4D authenticator. Exactly one of `password`/`apikey` must
    /// be `Some`.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: Option<String>,
        apikey: Option<String>,
        headers: Vec<(String, String)>,
        disable_ssl_verification: bool,
    ) -> Result<Cp4dAuthenticator> {
        let url = url.into();
        let username = username.into();

        if url.is_empty() {
            return Err(Error::validation("url is required for CP4D authentication"));
        }
        if username.is_empty() {
            return Err(Error::validation("username is required for CP4D authentication"));
        }
        let credential = match (password, apikey) {
            (Some(p), None) if !p.is_empty() => Credential::Password(p),
            (None, Some(k)) if !k.is_empty() => Credential::ApiKey(k),
            _ => {
                return Err(Error::validation(
                    "exactly one of password or apikey is required for CP4D authentication",
                ))
            }
        };

        Ok(Cp4dAuthenticator {
            inner: Arc::new(Cp4dInner {
                url: url.trim_end_matches('/').to_string(),
                username,
                credential,
                headers,
                client: default_http_client(disable_ssl_verification),
                manager: TokenManager::new(),
            }),
        })
    }
}

#[derive(Deserialize)]
struct Cp4dTokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
    iat: Option<i64>,
}

/// Derive `(expires_in, expiration)` for an opaque-looking CP4D token,
/// preferring a JWT's own `exp`/`iat` claims when present.
fn token_lifetime(token: &str, now: DateTime<Utc>) -> (i64, DateTime<Utc>) {
    if let Some((exp, iat)) = decode_jwt_exp_iat(token) {
        let expires_in = exp - iat;
        if expires_in > 0 {
            if let Some(expiration) = DateTime::from_timestamp(exp, 0) {
                return (expires_in, expiration);
            }
        }
    }
    (DEFAULT_LIFETIME_SECS, now + chrono::Duration::seconds(DEFAULT_LIFETIME_SECS))
}

fn decode_jwt_exp_iat(token: &str) -> Option<(i64, i64)> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None; // more than three segments: not a JWT
    }
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&decoded).ok()?;
    Some((claims.exp?, claims.iat?))
}

#[async_trait::async_trait]
impl TokenIssuer for Cp4dInner {
    async fn issue_token(&self) -> Result<TokenData> {
        let body = match &self.credential {
            Credential::Password(p) => serde_json::json!({"username": self.username, "password": p}),
            Credential::ApiKey(k) => serde_json::json!({"username": self.username, "api_key": k}),
        };

        let mut request = self
            .client
            .post(format!("{}/v1/authorize", self.url))
            .header(http::header::ACCEPT, "application/json")
            .header(http::header::CONTENT_TYPE, "application/json")
            .json(&body);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(Error::from)?;
        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let raw = response.bytes().await.unwrap_or_default().to_vec();
            let detailed = crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw));
            return Err(Error::authentication_with_response(
                format!("CP4D authorization failed with status {status}"),
                detailed,
            ));
        }

        let headers = response.headers().clone();
        let raw = response.bytes().await.map_err(Error::from)?.to_vec();
        let parsed: Cp4dTokenResponse = serde_json::from_slice(&raw).map_err(|e| {
            Error::authentication_with_response(
                format!("malformed CP4D authorize response: {e}"),
                crate::service::DetailedResponse::new(status.as_u16(), headers, crate::service::ResponseBody::Bytes(raw)),
            )
        })?;

        let now = Utc::now();
        let (expires_in, expiration) = token_lifetime(&parsed.token, now);
        TokenData::new(parsed.token, expires_in, expiration)
    }
}

#[async_trait::async_trait]
impl Authenticator for Cp4dAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::Cp4d
    }

    fn validate(&self) -> Result<()> {
        if self.inner.url.is_empty() || self.inner.username.is_empty() {
            return Err(Error::validation("CP4D authenticator requires url and username"));
        }
        Ok(())
    }

    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.inner.manager.get_token(self.inner.clone() as Arc<dyn TokenIssuer>).await?;
        request.add_header("Authorization", format!("Bearer {token}"))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn make_jwt(exp: i64, iat: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let claims = serde_json::json!({"exp": exp, "iat": iat});
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.")
    }

    #[test]
    fn test_new_rejects_both_password_and_apikey() {
        Cp4dAuthenticator::new("https://cp4d", "user", Some("pw".into()), Some("key".into()), vec![], false).unwrap_err();
    }

    #[test]
    fn test_new_rejects_neither_password_nor_apikey() {
        Cp4dAuthenticator::new("https://cp4d", "user", None, None, vec![], false).unwrap_err();
    }

    #[test]
    fn test_token_lifetime_defaults_for_opaque_token() {
        let now = Utc::now();
        let (expires_in, expiration) = token_lifetime("opaque-token-value", now);
        assert_eq!(expires_in, DEFAULT_LIFETIME_SECS);
        assert_eq!(expiration, now + chrono::Duration::seconds(DEFAULT_LIFETIME_SECS));
    }

    #[test]
    fn test_token_lifetime_prefers_jwt_claims() {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = iat + 120;
        let jwt = make_jwt(exp, iat);
        let (expires_in, expiration) = token_lifetime(&jwt, now);
        assert_eq!(expires_in, 120);
        assert_eq!(expiration.timestamp(), exp);
    }

    #[test]
    fn test_token_lifetime_falls_back_on_malformed_claims() {
        let now = Utc::now();
        let jwt = format!("{}.{}.", URL_SAFE_NO_PAD.encode("{}"), URL_SAFE_NO_PAD.encode("not json"));
        let (expires_in, _) = token_lifetime(&jwt, now);
        assert_eq!(expires_in, DEFAULT_LIFETIME_SECS);
    }
}
