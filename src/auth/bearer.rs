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

//! A static, caller-supplied bearer token with no refresh logic.

use super::{AuthenticationType, Authenticator};
use crate::error::{Error, Result};
use crate::request::RequestBuilder;

/// Sets `Authorization: Bearer <token>` on every request, verbatim.
pub struct BearerTokenAuthenticator {
    bearer_token: String,
}

impl BearerTokenAuthenticator {
    /// Build a bearer-token authenticator from a non-empty token.
    pub fn new<S: Into<String>>(bearer_token: S) -> Result<BearerTokenAuthenticator> {
        let auth = BearerTokenAuthenticator {
            bearer_token: bearer_token.into(),
        };
        auth.validate()?;
        Ok(auth)
    }
}

#[async_trait::async_trait]
impl Authenticator for BearerTokenAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::BearerToken
    }

    fn validate(&self) -> Result<()> {
        if self.bearer_token.is_empty() {
            return Err(Error::validation("bearer_token is required"));
        }
        Ok(())
    }

    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        request.add_header("Authorization", format!("Bearer {}", self.bearer_token))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_new_rejects_empty_token() {
        BearerTokenAuthenticator::new("").unwrap_err();
    }

    #[tokio::test]
    async fn test_apply_sets_bearer_header() {
        let auth = BearerTokenAuthenticator::new("tok123").unwrap();
        let builder = RequestBuilder::new(http::Method::GET);
        let builder = auth.apply(builder).await.unwrap();
        let spec = builder
            .resolve_request_url("https://x.example", "v1", &[])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(spec.headers.get(http::header::AUTHORIZATION).unwrap(), "Bearer tok123");
    }
}
