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

//! The token cache/refresh state machine shared by every token-issuing
//! authenticator (CP4D, IAM, Container, VPC).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::token::{TokenData, TokenState};

/// Something that can mint a fresh [`TokenData`] by talking to an identity
/// endpoint. Implemented by each token-issuing authenticator's inner state.
#[async_trait::async_trait]
pub(crate) trait TokenIssuer: Send + Sync {
    async fn issue_token(&self) -> Result<TokenData>;
}

/// How long a background refresh is assumed to still be in flight before
/// another one may be spawned.
const IN_FLIGHT_WINDOW_SECS: i64 = 60;

/// Owns the single mutable cell shared by an authenticator: its cached
/// token. Acquisition and refresh are both funneled through here so that
/// every token-issuing variant gets the same concurrency guarantees.
pub(crate) struct TokenManager {
    cached: Arc<Mutex<Option<TokenData>>>,
}

impl TokenManager {
    pub(crate) fn new() -> TokenManager {
        TokenManager {
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Return a usable access token, acquiring or refreshing one as needed.
    pub(crate) async fn get_token(&self, issuer: Arc<dyn TokenIssuer>) -> Result<String> {
        let now = Utc::now();
        let snapshot = self.cached.lock().await.clone();

        match snapshot {
            None => self.synchronous_refresh(issuer).await,
            Some(token) => match token.state(now) {
                TokenState::Expired => self.synchronous_refresh(issuer).await,
                TokenState::Stale => {
                    self.maybe_spawn_background_refresh(issuer, token.clone(), now).await;
                    Ok(token.access_token().to_string())
                }
                TokenState::Fresh => Ok(token.access_token().to_string()),
            },
        }
    }

    /// Acquire a new token under the lock, with a double-checked re-read so
    /// that concurrent callers collapse onto a single network call.
    async fn synchronous_refresh(&self, issuer: Arc<dyn TokenIssuer>) -> Result<String> {
        let mut guard = self.cached.lock().await;

        if let Some(token) = guard.as_ref() {
            match token.state(Utc::now()) {
                TokenState::Fresh | TokenState::Stale => {
                    return Ok(token.access_token().to_string());
                }
                TokenState::Expired => {}
            }
        }

        let fresh = issuer.issue_token().await?;
        let access_token = fresh.access_token().to_string();
        *guard = Some(fresh);
        Ok(access_token)
    }

    /// Spawn a background refresh unless one is already in flight, encoded
    /// by advancing the cached token's `refresh_at` by the in-flight window.
    async fn maybe_spawn_background_refresh(&self, issuer: Arc<dyn TokenIssuer>, observed: TokenData, now: DateTime<Utc>) {
        let mut guard = self.cached.lock().await;

        let still_the_same_stale_token = guard.as_ref().map(|t| t == &observed).unwrap_or(false);
        if !still_the_same_stale_token {
            return;
        }

        *guard = Some(observed.with_refresh_at(now + chrono::Duration::seconds(IN_FLIGHT_WINDOW_SECS)));
        drop(guard);

        let cached = self.cached.clone();
        tokio::spawn(async move {
            match issuer.issue_token().await {
                Ok(fresh) => {
                    *cached.lock().await = Some(fresh);
                }
                Err(e) => {
                    log::debug!("background token refresh failed, still serving the cached token: {e}");
                }
            }
        });
    }
}
