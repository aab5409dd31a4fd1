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

//! The base service: turns a [`RequestSpec`] into an HTTP exchange, classifies
//! the response, and folds non-2xx statuses into [`crate::error::Error`].

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::HeaderMap;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::auth::Authenticator;
use crate::config::ServiceProperties;
use crate::error::{Error, Result};
use crate::request::{BodyContent, RequestBuilder, RequestSpec};
use crate::utils::{build_http_client, ClientOptions};

/// The decoded body of a [`DetailedResponse`].
#[derive(Debug, Clone)]
pub enum ResponseBody {
    /// No body was read (the caller asked to discard it, or it was empty).
    None,
    /// Raw bytes, for `ResponseSink::Bytes`/`ResponseSink::Text` (UTF-8
    /// validity for `Text` is the caller's concern via [`DetailedResponse::result_text`]).
    Bytes(Vec<u8>),
    /// A decoded JSON document, for `ResponseSink::Json`.
    Json(serde_json::Value),
}

/// What to do with a successful (2xx-3xx) response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSink {
    /// Read and discard the body.
    Discard,
    /// Return the raw bytes.
    Bytes,
    /// Return the raw bytes; the caller interprets them as text.
    Text,
    /// Decode the body as JSON.
    Json,
}

/// A response together with its status and headers.
///
/// For any status >= 400 the raw bytes are always populated in
/// [`ResponseBody::Bytes`], even if the body could also be decoded as JSON,
/// so that callers can always recover the exact wire bytes from an error.
#[derive(Debug, Clone)]
pub struct DetailedResponse {
    status_code: u16,
    headers: HeaderMap,
    body: ResponseBody,
}

impl DetailedResponse {
    /// A response with no headers or body, for synthesizing errors that
    /// never reached the network (e.g. a missing credentials file).
    pub fn empty(status_code: u16) -> DetailedResponse {
        DetailedResponse {
            status_code,
            headers: HeaderMap::new(),
            body: ResponseBody::None,
        }
    }

    pub(crate) fn new(status_code: u16, headers: HeaderMap, body: ResponseBody) -> DetailedResponse {
        DetailedResponse {
            status_code,
            headers,
            body,
        }
    }

    /// The HTTP status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The decoded body.
    pub fn result(&self) -> &ResponseBody {
        &self.body
    }

    /// The raw bytes of the body, if any were kept.
    pub fn result_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The body decoded as UTF-8 text, if the bytes were kept and are valid UTF-8.
    pub fn result_text(&self) -> Option<&str> {
        self.result_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// The body decoded as JSON, if it was decoded as JSON.
    pub fn result_json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Deserialize the JSON body into `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self.body {
            ResponseBody::Json(v) => serde_json::from_value(v.clone()).map_err(|e| Error::Deserialization {
                source: e,
                raw: serde_json::to_vec(&v).unwrap_or_default(),
            }),
            ResponseBody::Bytes(raw) => serde_json::from_slice(&raw).map_err(|e| Error::Deserialization { source: e, raw }),
            ResponseBody::None => Err(Error::validation("response has no body to decode")),
        }
    }
}

/// Recognized shapes of a JSON error envelope, tried in order.
/// A field that is either the message itself (a string) or an object
/// carrying it under a nested `message` key, e.g. `{"error": "bad value"}`
/// and `{"error": {"message": "bad value"}}` are both recognized.
fn string_or_nested_message(field: &serde_json::Value) -> Option<String> {
    if let Some(s) = field.as_str() {
        return Some(s.to_string());
    }
    field.get("message").and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn extract_error_message(value: &serde_json::Value) -> Option<String> {
    if let Some(arr) = value.get("errors").and_then(|v| v.as_array()) {
        if let Some(msg) = arr.first().and_then(|e| e.get("message")).and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
    }
    if let Some(msg) = value.get("error").and_then(string_or_nested_message) {
        return Some(msg);
    }
    if let Some(msg) = value.get("message").and_then(string_or_nested_message) {
        return Some(msg);
    }
    if let Some(msg) = value.get("errorMessage").and_then(string_or_nested_message) {
        return Some(msg);
    }
    if let Some(msg) = value.get("msg").and_then(|v| v.as_str()) {
        return Some(msg.to_string());
    }
    None
}

fn reason_phrase(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown error")
        .to_string()
}

/// Resolved, per-instance options for a [`BaseService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Base URL all requests are resolved against.
    pub service_url: String,
    /// Gzip-compress byte request bodies before sending.
    pub enable_gzip_compression: bool,
    /// Disable TLS certificate verification. Never enable outside tests.
    pub disable_ssl_verification: bool,
    /// Overall per-request timeout, if any.
    pub timeout: Option<Duration>,
    /// Retry-with-backoff policy for the business request. `None` (the
    /// default) sends each request exactly once.
    pub retry_policy: Option<RetryPolicy>,
}

impl Default for ServiceOptions {
    fn default() -> ServiceOptions {
        ServiceOptions {
            service_url: String::new(),
            enable_gzip_compression: false,
            disable_ssl_verification: false,
            timeout: None,
            retry_policy: None,
        }
    }
}

/// Retry-with-backoff configuration for the business-request transport.
///
/// Off by default (see [`ServiceOptions::retry_policy`]). Never applied to
/// the identity endpoints an authenticator calls to acquire or refresh a
/// token, since those go through the authenticator's own HTTP client rather
/// than [`BaseService::send`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    max_wait: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try, so `3` allows up to two retries.
    /// A value of `0` is treated as `1` (no retry). `max_wait` caps the
    /// exponential backoff between attempts.
    pub fn new(max_attempts: u32, max_wait: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            max_wait,
        }
    }

    /// Total attempts permitted, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Ceiling on the backoff delay between attempts.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16).saturating_sub(1);
        let millis = 250u64.saturating_mul(1u64 << shift);
        Duration::from_millis(millis).min(self.max_wait)
    }
}

fn is_retryable(err: &Error) -> bool {
    match err {
        Error::Transport(_) => true,
        Error::Operation { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// The seam a retry decorator wraps: authenticate, send, and classify one
/// request. [`BaseService`] implements this directly; [`RetryingTransport`]
/// wraps any `Transport` to retry failed attempts with backoff.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and classify the response per `sink`.
    async fn call(&self, request: RequestBuilder, sink: ResponseSink) -> Result<DetailedResponse>;
}

#[async_trait::async_trait]
impl Transport for BaseService {
    async fn call(&self, request: RequestBuilder, sink: ResponseSink) -> Result<DetailedResponse> {
        self.send(request, sink).await
    }
}

/// Retries a [`Transport`] with exponential backoff, re-authenticating on
/// every attempt: a request is replayed from a cloned, pre-authentication
/// [`RequestBuilder`], so each attempt goes through `Authenticate` again
/// rather than reusing a possibly stale header.
///
/// A request whose body is a stream can only be read once; such requests are
/// sent a single time regardless of the configured policy.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    /// Wrap `inner`, retrying failed attempts per `policy`.
    pub fn new(inner: T, policy: RetryPolicy) -> RetryingTransport<T> {
        RetryingTransport { inner, policy }
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn call(&self, request: RequestBuilder, sink: ResponseSink) -> Result<DetailedResponse> {
        let mut attempt: u32 = 1;
        let mut current = request;
        loop {
            let replay = current.try_clone();
            let can_retry = attempt < self.policy.max_attempts && replay.is_some();
            match self.inner.call(current, sink).await {
                Ok(response) => return Ok(response),
                Err(err) if can_retry && is_retryable(&err) => {
                    log::warn!("retrying request after attempt {attempt} failed: {err}");
                    tokio::time::sleep(self.policy.backoff(attempt)).await;
                    current = replay.expect("checked by can_retry");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Shared runtime for a generated service client: an HTTP client, an
/// authenticator, and the per-instance options controlling how requests are
/// sent and responses are classified.
pub struct BaseService {
    client: reqwest::Client,
    authenticator: Arc<dyn Authenticator>,
    options: ServiceOptions,
}

impl BaseService {
    /// Build a `BaseService` from an already-configured `reqwest::Client`
    /// (see [`crate::utils::build_http_client`]) and an authenticator.
    pub fn new(client: reqwest::Client, authenticator: Arc<dyn Authenticator>, options: ServiceOptions) -> BaseService {
        BaseService {
            client,
            authenticator,
            options,
        }
    }

    /// The configured service URL.
    pub fn service_url(&self) -> &str {
        &self.options.service_url
    }

    /// The currently configured retry policy, if any.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.options.retry_policy
    }

    /// Layer resolved `properties` over this service's current options: URL,
    /// disable-SSL, enable-gzip, and retry configuration. A property absent
    /// from `properties` leaves the corresponding current value untouched.
    /// Changing `disable_ssl` rebuilds the underlying HTTP client.
    pub fn configure_service(&mut self, properties: &ServiceProperties) -> Result<()> {
        if let Some(url) = properties.get("url") {
            self.options.service_url = url.to_string();
        }

        if let Some(disable_ssl) = properties.get_bool("disable_ssl")? {
            if disable_ssl != self.options.disable_ssl_verification {
                self.options.disable_ssl_verification = disable_ssl;
                self.client = build_http_client(&ClientOptions {
                    disable_ssl_verification: disable_ssl,
                    timeout: self.options.timeout,
                    ..ClientOptions::default()
                })?;
            }
        }

        if let Some(enable_gzip) = properties.get_bool("enable_gzip")? {
            self.options.enable_gzip_compression = enable_gzip;
        }

        if let Some(max_attempts) = properties.get("retry_max_attempts") {
            let max_attempts: u32 = max_attempts
                .parse()
                .map_err(|_| Error::validation(format!("retry_max_attempts is not a valid integer: {max_attempts}")))?;
            let max_wait = match properties.get("retry_max_wait_seconds") {
                Some(v) => Duration::from_secs(
                    v.parse()
                        .map_err(|_| Error::validation(format!("retry_max_wait_seconds is not a valid integer: {v}")))?,
                ),
                None => Duration::from_secs(30),
            };
            self.options.retry_policy = Some(RetryPolicy::new(max_attempts, max_wait));
        }

        Ok(())
    }

    /// Start a request bound to this service's URL.
    pub fn request(&self, method: http::Method, path_template: &str, path_params: &[(&str, &str)]) -> Result<RequestBuilder> {
        RequestBuilder::new(method).resolve_request_url(&self.options.service_url, path_template, path_params)
    }

    /// Authenticate, send, and classify the response per `sink`.
    pub async fn send(&self, builder: RequestBuilder, sink: ResponseSink) -> Result<DetailedResponse> {
        let builder = self.authenticator.apply(builder).await?;
        let spec = builder.build()?;
        let response = self.dispatch(spec).await?;
        self.classify(response, sink).await
    }

    /// Authenticate, send, and stream the response body directly into
    /// `writer` rather than buffering it.
    pub async fn send_to_writer<W: AsyncWrite + Unpin>(&self, builder: RequestBuilder, writer: &mut W) -> Result<DetailedResponse> {
        let builder = self.authenticator.apply(builder).await?;
        let spec = builder.build()?;
        let response = self.dispatch(spec).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if status >= 400 {
            let raw = response.bytes().await.map_err(Error::from)?.to_vec();
            return Err(self.error_for_status(status, headers, raw));
        }

        let mut stream = response.bytes_stream();
        use futures::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::from)?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| Error::validation(format!("failed to write response body: {e}")))?;
        }

        Ok(DetailedResponse::new(status, headers, ResponseBody::None))
    }

    async fn dispatch(&self, spec: RequestSpec) -> Result<reqwest::Response> {
        let RequestSpec {
            method,
            url,
            query,
            mut headers,
            body,
        } = spec;

        let body = if self.options.enable_gzip_compression {
            compress_if_bytes(body, &mut headers)?
        } else {
            body
        };

        let mut request = self.client.request(method, url).query(&query).headers(headers);
        request = match body {
            BodyContent::Absent => request,
            BodyContent::Bytes(b) => request.body(b),
            BodyContent::Stream(s) => request.body(s),
            BodyContent::FormUrlEncoded(pairs) => request.form(&pairs),
            BodyContent::Multipart(form) => request.multipart(form),
        };

        if let Some(timeout) = self.options.timeout {
            request = request.timeout(timeout);
        }

        request.send().await.map_err(Error::from)
    }

    async fn classify(&self, response: reqwest::Response, sink: ResponseSink) -> Result<DetailedResponse> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if status >= 400 {
            let raw = response.bytes().await.map_err(Error::from)?.to_vec();
            return Err(self.error_for_status(status, headers, raw));
        }

        let body = match sink {
            ResponseSink::Discard => {
                response.bytes().await.map_err(Error::from)?;
                ResponseBody::None
            }
            ResponseSink::Bytes | ResponseSink::Text => {
                let raw = response.bytes().await.map_err(Error::from)?.to_vec();
                ResponseBody::Bytes(raw)
            }
            ResponseSink::Json => {
                let raw = response.bytes().await.map_err(Error::from)?.to_vec();
                if raw.is_empty() {
                    ResponseBody::None
                } else {
                    let value: serde_json::Value =
                        serde_json::from_slice(&raw).map_err(|e| Error::Deserialization { source: e, raw })?;
                    ResponseBody::Json(value)
                }
            }
        };

        Ok(DetailedResponse::new(status, headers, body))
    }

    fn error_for_status(&self, status: u16, headers: HeaderMap, raw: Vec<u8>) -> Error {
        let parsed: Option<serde_json::Value> = serde_json::from_slice(&raw).ok();
        let message = parsed
            .as_ref()
            .and_then(extract_error_message)
            .unwrap_or_else(|| reason_phrase(status));
        // Raw bytes must always be recoverable from an error response, even
        // though a JSON envelope could also be decoded.
        let response = DetailedResponse::new(status, headers, ResponseBody::Bytes(raw));
        Error::Operation { status, message, response }
    }
}

fn compress_if_bytes(body: BodyContent, headers: &mut HeaderMap) -> Result<BodyContent> {
    match body {
        BodyContent::Bytes(raw) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&raw)
                .and_then(|_| encoder.finish())
                .map(|compressed| {
                    headers.insert(CONTENT_ENCODING, http::HeaderValue::from_static("gzip"));
                    if !headers.contains_key(CONTENT_TYPE) {
                        headers.insert(CONTENT_TYPE, http::HeaderValue::from_static("application/octet-stream"));
                    }
                    BodyContent::Bytes(compressed)
                })
                .map_err(|e| Error::validation(format!("failed to gzip-compress request body: {e}")))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
pub mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_retry_policy_backoff_doubles_then_caps_at_max_wait() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
        assert_eq!(policy.backoff(4), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_rejects_zero_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_attempts(), 1);
    }

    #[test]
    fn test_is_retryable_for_transport_and_5xx_and_429() {
        let op = |status| Error::Operation {
            status,
            message: "x".into(),
            response: DetailedResponse::empty(status),
        };
        assert!(is_retryable(&op(500)));
        assert!(is_retryable(&op(429)));
        assert!(!is_retryable(&op(400)));
        assert!(!is_retryable(&Error::validation("bad")));
    }

    enum FakeOutcome {
        Success,
        ServerError,
    }

    struct FakeTransport {
        calls: AtomicUsize,
        outcomes: Vec<FakeOutcome>,
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        async fn call(&self, _request: RequestBuilder, _sink: ResponseSink) -> Result<DetailedResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.get(n).unwrap_or(&FakeOutcome::Success) {
                FakeOutcome::Success => Ok(DetailedResponse::empty(200)),
                FakeOutcome::ServerError => Err(Error::Operation {
                    status: 503,
                    message: "unavailable".into(),
                    response: DetailedResponse::empty(503),
                }),
            }
        }
    }

    fn fake_request() -> RequestBuilder {
        RequestBuilder::new(http::Method::GET)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
    }

    #[tokio::test]
    async fn test_retrying_transport_retries_until_success() {
        let inner = FakeTransport {
            calls: AtomicUsize::new(0),
            outcomes: vec![FakeOutcome::ServerError, FakeOutcome::ServerError, FakeOutcome::Success],
        };
        let retrying = RetryingTransport::new(inner, RetryPolicy::new(5, Duration::from_millis(1)));
        let resp = retrying.call(fake_request(), ResponseSink::Discard).await.unwrap();
        assert_eq!(resp.status_code(), 200);
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_transport_gives_up_after_max_attempts() {
        let inner = FakeTransport {
            calls: AtomicUsize::new(0),
            outcomes: vec![FakeOutcome::ServerError, FakeOutcome::ServerError],
        };
        let retrying = RetryingTransport::new(inner, RetryPolicy::new(2, Duration::from_millis(1)));
        let err = retrying.call(fake_request(), ResponseSink::Discard).await.unwrap_err();
        assert!(matches!(err, Error::Operation { status: 503, .. }));
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_configure_service_layers_url_and_retry_config() {
        let client = build_http_client(&ClientOptions::default()).unwrap();
        let mut service = BaseService::new(client, Arc::new(crate::auth::NoAuthAuthenticator::new()), ServiceOptions::default());

        let mut props = ServiceProperties::new();
        props.insert("url", "https://configured.example");
        props.insert("retry_max_attempts", "3");
        props.insert("retry_max_wait_seconds", "5");
        service.configure_service(&props).unwrap();

        assert_eq!(service.service_url(), "https://configured.example");
        let policy = service.retry_policy().unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.max_wait(), Duration::from_secs(5));
    }

    #[test]
    fn test_configure_service_leaves_unset_properties_untouched() {
        let client = build_http_client(&ClientOptions::default()).unwrap();
        let mut service = BaseService::new(
            client,
            Arc::new(crate::auth::NoAuthAuthenticator::new()),
            ServiceOptions {
                service_url: "https://original.example".into(),
                ..ServiceOptions::default()
            },
        );

        service.configure_service(&ServiceProperties::new()).unwrap();
        assert_eq!(service.service_url(), "https://original.example");
        assert!(service.retry_policy().is_none());
    }

    #[test]
    fn test_detailed_response_empty() {
        let resp = DetailedResponse::empty(401);
        assert_eq!(resp.status_code(), 401);
        assert!(resp.result_bytes().is_none());
    }

    #[test]
    fn test_extract_error_message_errors_array() {
        let v = serde_json::json!({"errors": [{"message": "bad apikey"}]});
        assert_eq!(extract_error_message(&v), Some("bad apikey".to_string()));
    }

    #[test]
    fn test_extract_error_message_error_string() {
        let v = serde_json::json!({"error": "not found"});
        assert_eq!(extract_error_message(&v), Some("not found".to_string()));
    }

    #[test]
    fn test_extract_error_message_message_field() {
        let v = serde_json::json!({"message": "oops"});
        assert_eq!(extract_error_message(&v), Some("oops".to_string()));
    }

    #[test]
    fn test_extract_error_message_error_message_field() {
        let v = serde_json::json!({"errorMessage": "oops2"});
        assert_eq!(extract_error_message(&v), Some("oops2".to_string()));
    }

    #[test]
    fn test_extract_error_message_msg_field() {
        let v = serde_json::json!({"msg": "oops3"});
        assert_eq!(extract_error_message(&v), Some("oops3".to_string()));
    }

    #[test]
    fn test_extract_error_message_none_for_unrecognized_shape() {
        let v = serde_json::json!({"unexpected": "shape"});
        assert_eq!(extract_error_message(&v), None);
    }

    #[test]
    fn test_extract_error_message_nested_error_object() {
        let v = serde_json::json!({"error": {"message": "bad request"}});
        assert_eq!(extract_error_message(&v), Some("bad request".to_string()));
    }

    #[test]
    fn test_extract_error_message_nested_message_object() {
        let v = serde_json::json!({"message": {"message": "bad request"}});
        assert_eq!(extract_error_message(&v), Some("bad request".to_string()));
    }

    #[test]
    fn test_extract_error_message_nested_error_message_object() {
        let v = serde_json::json!({"errorMessage": {"message": "bad request"}});
        assert_eq!(extract_error_message(&v), Some("bad request".to_string()));
    }

    #[test]
    fn test_compress_if_bytes_sets_content_encoding() {
        let mut headers = HeaderMap::new();
        let compressed = compress_if_bytes(BodyContent::Bytes(b"hello world".to_vec()), &mut headers).unwrap();
        assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "gzip");
        match compressed {
            BodyContent::Bytes(b) => assert!(!b.is_empty()),
            _ => panic!("expected bytes"),
        }
    }

    #[test]
    fn test_compress_if_bytes_leaves_other_kinds_untouched() {
        let mut headers = HeaderMap::new();
        let result = compress_if_bytes(BodyContent::Absent, &mut headers).unwrap();
        assert!(matches!(result, BodyContent::Absent));
        assert!(!headers.contains_key(CONTENT_ENCODING));
    }
}
