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

//! Building the `reqwest::Client` shared by a [`crate::service::BaseService`].

use std::time::Duration;

use crate::error::{Error, Result};

/// The library-identifying token composed into every request's `User-Agent`.
pub const USER_AGENT: &str = concat!("ibm-cloud-sdk-core-rust/", env!("CARGO_PKG_VERSION"));

/// Minimum TLS protocol version a service client is willing to negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinimumTlsVersion {
    /// Accept whatever the platform TLS stack defaults to.
    #[default]
    Default,
    /// Refuse to negotiate below TLS 1.2.
    Tls12,
    /// Refuse to negotiate below TLS 1.3.
    Tls13,
}

/// Construction-time knobs for [`build_http_client`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Skip TLS certificate verification entirely. Never enable this outside
    /// of tests against a known endpoint.
    pub disable_ssl_verification: bool,
    /// Minimum TLS protocol version to negotiate.
    pub minimum_tls_version: MinimumTlsVersion,
    /// Overall per-request timeout.
    pub timeout: Option<Duration>,
}

/// Build the `reqwest::Client` a [`crate::service::BaseService`] sends
/// requests through, applying the TLS and timeout knobs this core exposes.
///
/// Response decompression (gzip, deflate, brotli) is handled transparently
/// by `reqwest`'s own feature; only the *request* side has an explicit
/// compression knob (see [`crate::service::ServiceOptions::enable_gzip_compression`]).
pub fn build_http_client(options: &ClientOptions) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(options.disable_ssl_verification);

    builder = match options.minimum_tls_version {
        MinimumTlsVersion::Default => builder,
        MinimumTlsVersion::Tls12 => builder.min_tls_version(reqwest::tls::Version::TLS_1_2),
        MinimumTlsVersion::Tls13 => builder.min_tls_version(reqwest::tls::Version::TLS_1_3),
    };

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().map_err(|e| Error::validation(format!("failed to build HTTP client: {e}")))
}
