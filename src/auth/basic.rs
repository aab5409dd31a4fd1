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

//! HTTP Basic authentication.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::{AuthenticationType, Authenticator};
use crate::error::{Error, Result};
use crate::request::RequestBuilder;

/// Sets `Authorization: Basic <base64(username:password)>` on every request.
pub struct BasicAuthenticator {
    username: String,
    password: String,
}

impl BasicAuthenticator {
    /// Build a Basic authenticator, validating `username`/`password` eagerly.
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Result<BasicAuthenticator> {
        let auth = BasicAuthenticator {
            username: username.into(),
            password: password.into(),
        };
        auth.validate()?;
        Ok(auth)
    }
}

fn validate_component(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{name} is required for basic authentication")));
    }
    if value.starts_with('{') || value.ends_with('}') {
        return Err(Error::validation(format!(
            "{name} must not be enclosed in curly brackets, it looks like an unresolved placeholder"
        )));
    }
    if value.contains('"') {
        return Err(Error::validation(format!("{name} must not contain quotes")));
    }
    Ok(())
}

#[async_trait::async_trait]
impl Authenticator for BasicAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::Basic
    }

    fn validate(&self) -> Result<()> {
        validate_component("username", &self.username)?;
        validate_component("password", &self.password)
    }

    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        request.add_header("Authorization", format!("Basic {encoded}"))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_new_rejects_empty_username() {
        BasicAuthenticator::new("", "pw").unwrap_err();
    }

    #[test]
    fn test_new_rejects_placeholder_looking_value() {
        BasicAuthenticator::new("{username}", "pw").unwrap_err();
    }

    #[test]
    fn test_new_rejects_quoted_value() {
        BasicAuthenticator::new("user", "\"pw\"").unwrap_err();
    }

    #[tokio::test]
    async fn test_apply_sets_base64_authorization_header() {
        let auth = BasicAuthenticator::new("user", "pw").unwrap();
        let builder = RequestBuilder::new(http::Method::GET);
        let builder = auth.apply(builder).await.unwrap();
        let spec = builder
            .resolve_request_url("https://x.example", "v1", &[])
            .unwrap()
            .build()
            .unwrap();
        let expected = format!("Basic {}", STANDARD.encode("user:pw"));
        assert_eq!(spec.headers.get(http::header::AUTHORIZATION).unwrap(), expected.as_str());
    }
}
