//! Shared helpers for the integration test suite.

use std::sync::atomic::{AtomicUsize, Ordering};

use wiremock::{Request, Respond, ResponseTemplate};

/// An IAM `/identity/token`-shaped responder that mints a fresh
/// `access_token` on every call (`TOK0`, `TOK1`, ...), so a test can tell
/// which issuance served a given request.
pub struct IncrementingIamToken {
    pub calls: AtomicUsize,
    pub expires_in: i64,
}

impl IncrementingIamToken {
    pub fn new(expires_in: i64) -> IncrementingIamToken {
        IncrementingIamToken {
            calls: AtomicUsize::new(0),
            expires_in,
        }
    }
}

impl Respond for IncrementingIamToken {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = chrono::Utc::now().timestamp();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": format!("TOK{n}"),
            "expires_in": self.expires_in,
            "expiration": now + self.expires_in,
        }))
    }
}

/// Matches a request whose raw body contains `needle` as a substring.
///
/// Used in place of an exact body match so assertions don't depend on the
/// precise percent-encoding `reqwest::RequestBuilder::form` produces.
pub struct BodyContains(pub &'static str);

impl wiremock::Match for BodyContains {
    fn matches(&self, request: &Request) -> bool {
        String::from_utf8_lossy(&request.body).contains(self.0)
    }
}

/// Extract the bearer token an [`ibm_cloud_sdk_core::auth::Authenticator`]
/// attached to a freshly built request against a throwaway URL.
pub async fn bearer_token(authenticator: &dyn ibm_cloud_sdk_core::auth::Authenticator) -> String {
    let builder = ibm_cloud_sdk_core::request::RequestBuilder::new(http::Method::GET)
        .resolve_request_url("https://unused.example", "v1/probe", &[])
        .unwrap();
    let builder = authenticator.apply(builder).await.unwrap();
    let spec = builder.build().unwrap();
    let header = spec.headers().get(http::header::AUTHORIZATION).unwrap().to_str().unwrap();
    header.strip_prefix("Bearer ").unwrap().to_string()
}
