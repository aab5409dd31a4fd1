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

//! Error and Result implementations.

use crate::service::DetailedResponse;

/// Result of a core operation.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Error raised by any part of the core runtime.
///
/// Mirrors the tagged error union: validation, authentication, transport,
/// operation (HTTP status >= 400) and deserialization failures are kept as
/// distinct variants so callers can match on [`Error::kind`] without parsing
/// the message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration is invalid, a request could not be built, or a sink
    /// type is unsupported.
    #[error("validation error: {0}")]
    Validation(String),

    /// Token acquisition failed. Carries the identity endpoint's response
    /// when one was received; a pre-network failure (e.g. an unreadable CR
    /// token file) carries `None`.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Human readable cause.
        message: String,
        /// Response from the identity endpoint, if any.
        response: Option<DetailedResponse>,
    },

    /// TCP/TLS/timeout failure before any HTTP status was observed.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server returned an HTTP status >= 400.
    #[error("operation failed with status {status}: {message}")]
    Operation {
        /// HTTP status code.
        status: u16,
        /// Message extracted from a recognized error envelope, or the
        /// status's canonical reason phrase if none could be extracted.
        message: String,
        /// Full response, with raw bytes always populated.
        response: DetailedResponse,
    },

    /// The response body could not be decoded into the requested type.
    #[error("failed to decode response body: {source}")]
    Deserialization {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// Raw bytes of the response that failed to decode.
        raw: Vec<u8>,
    },
}

impl Error {
    pub(crate) fn validation<S: Into<String>>(message: S) -> Error {
        Error::Validation(message.into())
    }

    pub(crate) fn authentication<S: Into<String>>(message: S) -> Error {
        Error::Authentication {
            message: message.into(),
            response: None,
        }
    }

    pub(crate) fn authentication_with_response<S: Into<String>>(
        message: S,
        response: DetailedResponse,
    ) -> Error {
        Error::Authentication {
            message: message.into(),
            response: Some(response),
        }
    }

    /// Stable tag for this error's variant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Operation { .. } => ErrorKind::Operation,
            Error::Deserialization { .. } => ErrorKind::Deserialization,
        }
    }

    /// The [`DetailedResponse`] carried by this error, if any.
    pub fn response(&self) -> Option<&DetailedResponse> {
        match self {
            Error::Authentication { response, .. } => response.as_ref(),
            Error::Operation { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// Stable, matchable tag for an [`Error`]'s variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::Authentication`].
    Authentication,
    /// See [`Error::Transport`].
    Transport,
    /// See [`Error::Operation`].
    Operation,
    /// See [`Error::Deserialization`].
    Deserialization,
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Error {
        Error::Transport(value)
    }
}

impl From<reqwest::header::InvalidHeaderValue> for Error {
    fn from(value: reqwest::header::InvalidHeaderValue) -> Error {
        Error::validation(value.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Error {
        Error::validation(value.to_string())
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = Error::validation("bad input");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.response().is_none());
    }

    #[test]
    fn test_authentication_carries_response() {
        let resp = DetailedResponse::empty(401);
        let err = Error::authentication_with_response("bad credentials", resp);
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.response().unwrap().status_code(), 401);
    }
}
