//! S4: Container authentication reads a CR token from a file and exchanges
//! it at the IAM endpoint for an access token scoped to a trusted profile.

mod support;

use ibm_cloud_sdk_core::auth::ContainerAuthenticator;
use support::{bearer_token, BodyContains};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_container_exchanges_file_cr_token_for_access_token() {
    let dir = tempfile::tempdir().unwrap();
    let cr_token_path = dir.path().join("cr-token");
    tokio::fs::write(&cr_token_path, "cr-token-1\n").await.unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(BodyContains("grant_type=urn"))
        .and(BodyContains("cr_token=cr-token-1"))
        .and(BodyContains("profile_name=prof"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A1",
            "expires_in": 3600,
            "expiration": chrono::Utc::now().timestamp() + 3600,
        })))
        .mount(&server)
        .await;

    let auth = ContainerAuthenticator::new(
        Some("prof".into()),
        None,
        Some(cr_token_path.to_string_lossy().into_owned()),
        None,
        Some(server.uri()),
        None,
        None,
        None,
        false,
    )
    .unwrap();

    let token = bearer_token(&auth).await;
    assert_eq!(token, "A1");
}
