//! S1 / S2: IAM token acquisition, caching, and background refresh.

mod support;

use std::sync::Arc;
use std::time::Duration;

use ibm_cloud_sdk_core::auth::IamAuthenticator;
use support::{bearer_token, IncrementingIamToken};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

/// First call fetches a token over the network; a second call before the
/// refresh window opens is served entirely from cache.
#[tokio::test]
async fn test_iam_first_fetch_then_cache_hit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(IncrementingIamToken::new(3600))
        .mount(&server)
        .await;

    let auth = IamAuthenticator::from_api_key("k1", Some(server.uri()), None, None, None, false).unwrap();

    let first = bearer_token(&auth).await;
    let second = bearer_token(&auth).await;

    assert_eq!(first, "TOK0");
    assert_eq!(second, "TOK0", "a fresh token must be served from cache without a second network call");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

/// Once the token's lifetime has fully elapsed, the next call performs a
/// fresh synchronous fetch rather than serving the stale value.
#[tokio::test]
async fn test_iam_refetches_after_expiration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(IncrementingIamToken::new(1))
        .mount(&server)
        .await;

    let auth = IamAuthenticator::from_api_key("k1", Some(server.uri()), None, None, None, false).unwrap();

    assert_eq!(bearer_token(&auth).await, "TOK0");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(bearer_token(&auth).await, "TOK1");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

/// S2: once a cached token enters its refresh window it is still served
/// immediately, while a background refresh brings in the replacement that
/// later calls observe.
#[tokio::test]
async fn test_iam_stale_token_served_while_refreshed_in_background() {
    let server = MockServer::start().await;
    // expires_in = 5s, refresh window opens 1s early (floor(0.2 * 5) = 1) at t=4s.
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(IncrementingIamToken::new(5))
        .mount(&server)
        .await;

    let auth = Arc::new(IamAuthenticator::from_api_key("k1", Some(server.uri()), None, None, None, false).unwrap());

    assert_eq!(bearer_token(auth.as_ref()).await, "TOK0");

    tokio::time::sleep(Duration::from_millis(4200)).await;
    let stale_served = bearer_token(auth.as_ref()).await;
    assert_eq!(stale_served, "TOK0", "a stale-but-valid token is still served synchronously");

    // Give the spawned background refresh time to land.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let refreshed = bearer_token(auth.as_ref()).await;
    assert_eq!(refreshed, "TOK1", "a later call observes the token the background refresh fetched");
}
