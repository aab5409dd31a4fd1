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

//! The authenticator family: a common trait plus one module per variant.

mod basic;
mod bearer;
mod container;
mod cp4d;
mod factory;
mod iam;
mod no_auth;
mod token_manager;
mod vpc;

pub use basic::BasicAuthenticator;
pub use bearer::BearerTokenAuthenticator;
pub use container::ContainerAuthenticator;
pub use cp4d::Cp4dAuthenticator;
pub use factory::get_authenticator_from_environment;
pub use iam::IamAuthenticator;
pub use no_auth::NoAuthAuthenticator;
pub use vpc::VpcInstanceAuthenticator;

use crate::error::Result;
use crate::request::RequestBuilder;

/// Stable tag identifying an [`Authenticator`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationType {
    /// See [`NoAuthAuthenticator`].
    NoAuth,
    /// See [`BasicAuthenticator`].
    Basic,
    /// See [`BearerTokenAuthenticator`].
    BearerToken,
    /// See [`Cp4dAuthenticator`].
    Cp4d,
    /// See [`IamAuthenticator`].
    Iam,
    /// See [`ContainerAuthenticator`].
    Container,
    /// See [`VpcInstanceAuthenticator`].
    Vpc,
}

/// Applies credentials to an outbound request.
///
/// Implementations must be safe to call concurrently: token-issuing variants
/// serialize acquisition internally (see `token_manager`) rather than
/// requiring external synchronization.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// The variant this authenticator implements.
    fn authentication_type(&self) -> AuthenticationType;

    /// Pure check of this authenticator's configuration.
    fn validate(&self) -> Result<()>;

    /// Attach credentials to `request`, acquiring or refreshing a token
    /// first if this variant issues one.
    async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder>;
}

fn default_http_client(disable_ssl_verification: bool) -> reqwest::Client {
    let builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(disable_ssl_verification)
        .timeout(std::time::Duration::from_secs(30));
    // A client built with only well-formed, constant configuration is not
    // expected to fail; an authenticator with a genuinely bad TLS stack will
    // surface that on the first real request instead.
    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}
