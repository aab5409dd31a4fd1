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

//! An authenticator that attaches no credentials at all.

use super::{AuthenticationType, Authenticator};
use crate::error::Result;
use crate::request::RequestBuilder;

/// Attaches nothing; used for services that require no authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthAuthenticator;

impl NoAuthAuthenticator {
    /// Build a new no-op authenticator.
    pub fn new() -> NoAuthAuthenticator {
        NoAuthAuthenticator
    }
}

#[async_trait::async_trait]
impl Authenticator for NoAuthAuthenticator {
    fn authentication_type(&self) -> AuthenticationType {
        AuthenticationType::NoAuth
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[tokio::test]
    async fn test_apply_is_a_no_op() {
        let auth = NoAuthAuthenticator::new();
        auth.validate().unwrap();
        let builder = RequestBuilder::new(http::Method::GET);
        let builder = auth.apply(builder).await.unwrap();
        let spec = builder.resolve_request_url("https://x.example", "v1", &[]).unwrap().build().unwrap();
        assert!(!spec.headers.contains_key(http::header::AUTHORIZATION));
    }
}
