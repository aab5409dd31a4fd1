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

//! Immutable record of a single issued access token.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// An access token issued by an identity provider, together with the
/// timestamps derived from its lifetime.
///
/// Once constructed, a `TokenData` never changes; a refresh replaces the
/// whole value rather than mutating it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData {
    access_token: String,
    expiration: DateTime<Utc>,
    refresh_at: DateTime<Utc>,
}

impl TokenData {
    /// Build a `TokenData` from the fields of an identity-server response.
    ///
    /// `expiration` is trusted as an absolute instant (epoch seconds,
    /// already resolved by the caller into a `DateTime`); `expires_in` is
    /// the token's total lifetime in seconds, used only to compute the
    /// early-refresh buffer. Fails if `expires_in` is not positive.
    pub fn new(access_token: String, expires_in: i64, expiration: DateTime<Utc>) -> Result<TokenData> {
        if access_token.is_empty() {
            return Err(Error::validation("token response is missing access_token"));
        }
        if expires_in <= 0 {
            return Err(Error::validation("token response has a non-positive expires_in"));
        }

        let buffer_secs = (expires_in as f64 * 0.2).floor() as i64;
        let refresh_at = expiration - chrono::Duration::seconds(buffer_secs);

        Ok(TokenData {
            access_token,
            expiration,
            refresh_at,
        })
    }

    /// The opaque bearer token value.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Absolute expiration instant.
    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    /// Absolute instant at which a proactive refresh should be attempted.
    pub fn refresh_at(&self) -> DateTime<Utc> {
        self.refresh_at
    }

    /// `true` while the token is still usable at `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expiration
    }

    /// `true` once `now` has entered the refresh window, i.e. the token is
    /// still valid but a background refresh should be kicked off.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_at
    }

    /// Current lifecycle state of this token at `now`.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if !self.is_valid(now) {
            TokenState::Expired
        } else if self.needs_refresh(now) {
            TokenState::Stale
        } else {
            TokenState::Fresh
        }
    }

    /// Return a copy of this token with `refresh_at` advanced to `at`.
    ///
    /// Used to mark a background refresh as in flight without introducing a
    /// separate boolean flag: advancing `refresh_at` by the in-flight window
    /// is the single source of truth for "a refresh was already scheduled".
    pub(crate) fn with_refresh_at(&self, at: DateTime<Utc>) -> TokenData {
        TokenData {
            access_token: self.access_token.clone(),
            expiration: self.expiration,
            refresh_at: at,
        }
    }
}

/// Lifecycle state of a cached token relative to "now".
///
/// There is no cached-token state distinct from `Absent`; the token manager
/// models that with `Option<TokenData>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Valid, outside the refresh window.
    Fresh,
    /// Valid, inside the refresh window: serve it, but kick off a refresh.
    Stale,
    /// No longer valid.
    Expired,
}
