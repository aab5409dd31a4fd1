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

//! Composing an outbound HTTP request: method, URL, query, headers and body.

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio::io::AsyncRead;
use url::Url;

use crate::error::{Error, Result};

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/');

const JSON_CONTENT_TYPE: &str = "application/json";
const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";
const FORM_URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

type BoxAsyncRead = Box<dyn AsyncRead + Send + Unpin + 'static>;

/// A value of a typed, non-JSON request body (see [`RequestBuilder::set_body_content`]).
pub enum NonJsonBody {
    /// Raw text body.
    Str(String),
    /// Raw byte body.
    Bytes(Vec<u8>),
    /// A streamed body of unknown length.
    Stream(BoxAsyncRead),
}

/// One field of a multipart/form-url-encoded body.
#[derive(Clone)]
struct FormField {
    field_name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    value: FormValue,
}

/// The value carried by a [`FormField`].
#[derive(Clone)]
pub enum FormValue {
    /// A text value.
    Text(String),
    /// A binary value (e.g. file contents).
    Bytes(Vec<u8>),
}

enum BodyKind {
    Json(serde_json::Value),
    JsonPatch(json_patch::Patch),
    Str(String),
    Bytes(Vec<u8>),
    Stream(BoxAsyncRead),
}

impl BodyKind {
    /// Clones the body if it is replayable. A streamed body is read once and
    /// cannot be cloned, mirroring `reqwest::Request::try_clone`.
    fn try_clone(&self) -> Option<BodyKind> {
        match self {
            BodyKind::Json(v) => Some(BodyKind::Json(v.clone())),
            BodyKind::JsonPatch(p) => Some(BodyKind::JsonPatch(p.clone())),
            BodyKind::Str(s) => Some(BodyKind::Str(s.clone())),
            BodyKind::Bytes(b) => Some(BodyKind::Bytes(b.clone())),
            BodyKind::Stream(_) => None,
        }
    }
}

/// The finalized, send-once body of a [`RequestSpec`].
pub enum BodyContent {
    /// No body.
    Absent,
    /// A body with a known length.
    Bytes(Vec<u8>),
    /// A streamed body of unknown length.
    Stream(reqwest::Body),
    /// `application/x-www-form-urlencoded` pairs.
    FormUrlEncoded(Vec<(String, String)>),
    /// A `multipart/form-data` body.
    Multipart(reqwest::multipart::Form),
}

/// A fully resolved, ready-to-send HTTP request.
///
/// Built once by a [`RequestBuilder`] and consumed once by the base service.
pub struct RequestSpec {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: BodyContent,
}

impl RequestSpec {
    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The resolved URL, before query parameters are applied.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The accumulated query parameters, in insertion order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The resolved headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body envelope.
    pub fn body(&self) -> &BodyContent {
        &self.body
    }
}

/// Builds a [`RequestSpec`] step by step, mirroring the shape of the
/// IBM Cloud SDKs' request builders.
pub struct RequestBuilder {
    method: Method,
    url: Option<Url>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    form_fields: Vec<FormField>,
    body: Option<BodyKind>,
}

impl RequestBuilder {
    /// Start building a request with an empty URL, query, headers and body.
    pub fn new(method: Method) -> RequestBuilder {
        RequestBuilder {
            method,
            url: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            form_fields: Vec::new(),
            body: None,
        }
    }

    /// Resolve the request URL from a service URL, a path template
    /// containing `{name}` placeholders, and the values to substitute.
    ///
    /// Fails if `service_url` is empty or syntactically invalid, or if a
    /// placeholder in `path_template` has no corresponding value in
    /// `path_params`.
    pub fn resolve_request_url(
        mut self,
        service_url: &str,
        path_template: &str,
        path_params: &[(&str, &str)],
    ) -> Result<RequestBuilder> {
        self.url = Some(resolve_request_url(service_url, path_template, path_params)?);
        Ok(self)
    }

    /// Append a query parameter. Duplicates are permitted; order is
    /// preserved per parameter name.
    pub fn add_query<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> RequestBuilder {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Append a header. Header names are matched case-insensitively per
    /// HTTP convention; repeated values are allowed.
    pub fn add_header<V: Into<String>>(mut self, name: &str, value: V) -> Result<RequestBuilder> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::validation(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(&value.into())
            .map_err(|e| Error::validation(format!("invalid header value: {e}")))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Serialize `obj` as a JSON body; sets `Content-Type: application/json`
    /// unless a content type is already set.
    pub fn set_body_content_json<T: serde::Serialize>(mut self, obj: &T) -> Result<RequestBuilder> {
        let value = serde_json::to_value(obj)
            .map_err(|e| Error::validation(format!("failed to serialize JSON body: {e}")))?;
        self.set_default_content_type(JSON_CONTENT_TYPE);
        self.body = Some(BodyKind::Json(value));
        Ok(self)
    }

    /// Set a raw text body.
    pub fn set_body_content_string<S: Into<String>>(mut self, s: S) -> RequestBuilder {
        self.body = Some(BodyKind::Str(s.into()));
        self
    }

    /// Set a streamed body of unknown length.
    pub fn set_body_content_stream<R: AsyncRead + Send + Unpin + 'static>(mut self, reader: R) -> RequestBuilder {
        self.body = Some(BodyKind::Stream(Box::new(reader)));
        self
    }

    /// Dispatcher matching the IBM Cloud SDKs' `SetBodyContent`: exactly one
    /// of `content_type`-bearing inputs must be provided.
    pub fn set_body_content(
        mut self,
        content_type: &str,
        json_obj: Option<serde_json::Value>,
        json_patch_obj: Option<json_patch::Patch>,
        non_json: Option<NonJsonBody>,
    ) -> Result<RequestBuilder> {
        let provided = [json_obj.is_some(), json_patch_obj.is_some(), non_json.is_some()]
            .iter()
            .filter(|x| **x)
            .count();
        if provided != 1 {
            return Err(Error::validation(
                "set_body_content requires exactly one of json_obj, json_patch_obj, non_json",
            ));
        }

        self.set_default_content_type(content_type);

        if let Some(value) = json_obj {
            self.body = Some(BodyKind::Json(value));
        } else if let Some(patch) = json_patch_obj {
            self.headers_overwrite_content_type(JSON_PATCH_CONTENT_TYPE);
            self.body = Some(BodyKind::JsonPatch(patch));
        } else {
            match non_json.unwrap() {
                NonJsonBody::Str(s) => self.body = Some(BodyKind::Str(s)),
                NonJsonBody::Bytes(b) => self.body = Some(BodyKind::Bytes(b)),
                NonJsonBody::Stream(r) => self.body = Some(BodyKind::Stream(r)),
            }
        }
        Ok(self)
    }

    /// Accumulate one form part. `file_name`/`content_type` are only used
    /// when the body ends up encoded as `multipart/form-data`.
    pub fn add_form_data<N: Into<String>>(
        mut self,
        field_name: N,
        file_name: Option<String>,
        content_type: Option<String>,
        value: FormValue,
    ) -> RequestBuilder {
        self.form_fields.push(FormField {
            field_name: field_name.into(),
            file_name,
            content_type,
            value,
        });
        self
    }

    /// Clones this builder if every part of it is replayable. Returns `None`
    /// if the body is a stream, which can only be read once — mirroring
    /// `reqwest::Request::try_clone`. Used by the retry decorator to replay a
    /// request on a fresh attempt without holding onto a consumed stream.
    pub(crate) fn try_clone(&self) -> Option<RequestBuilder> {
        let body = match &self.body {
            None => None,
            Some(b) => Some(b.try_clone()?),
        };
        Some(RequestBuilder {
            method: self.method.clone(),
            url: self.url.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            form_fields: self.form_fields.clone(),
            body,
        })
    }

    /// Finalize the request. Fails if the URL was never resolved.
    pub fn build(self) -> Result<RequestSpec> {
        let url = self
            .url
            .ok_or_else(|| Error::validation("SERVICE_URL_MISSING: the request URL was never resolved"))?;

        let body = if !self.form_fields.is_empty() {
            if self.declared_content_type_is_form_urlencoded() {
                BodyContent::FormUrlEncoded(
                    self.form_fields
                        .into_iter()
                        .map(|f| (f.field_name, form_value_to_string(f.value)))
                        .collect(),
                )
            } else {
                BodyContent::Multipart(build_multipart_form(self.form_fields)?)
            }
        } else {
            match self.body {
                None => BodyContent::Absent,
                Some(BodyKind::Bytes(b)) => BodyContent::Bytes(b),
                Some(BodyKind::Str(s)) => BodyContent::Bytes(s.into_bytes()),
                Some(BodyKind::Json(v)) => BodyContent::Bytes(
                    serde_json::to_vec(&v).map_err(|e| Error::validation(format!("failed to encode JSON body: {e}")))?,
                ),
                Some(BodyKind::JsonPatch(p)) => BodyContent::Bytes(
                    serde_json::to_vec(&p)
                        .map_err(|e| Error::validation(format!("failed to encode JSON patch body: {e}")))?,
                ),
                Some(BodyKind::Stream(r)) => {
                    BodyContent::Stream(reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(r)))
                }
            }
        };

        Ok(RequestSpec {
            method: self.method,
            url,
            query: self.query,
            headers: self.headers,
            body,
        })
    }

    fn declared_content_type_is_form_urlencoded(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case(FORM_URLENCODED_CONTENT_TYPE))
            .unwrap_or(false)
    }

    fn set_default_content_type(&mut self, content_type: &str) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                self.headers.insert(CONTENT_TYPE, value);
            }
        }
    }

    fn headers_overwrite_content_type(&mut self, content_type: &str) {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(CONTENT_TYPE, value);
        }
    }
}

fn form_value_to_string(value: FormValue) -> String {
    match value {
        FormValue::Text(s) => s,
        FormValue::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
    }
}

fn build_multipart_form(fields: Vec<FormField>) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        let mut part = match field.value {
            FormValue::Text(s) => reqwest::multipart::Part::text(s),
            FormValue::Bytes(b) => reqwest::multipart::Part::bytes(b),
        };
        if let Some(file_name) = field.file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = field.content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| Error::validation(format!("invalid multipart content type: {e}")))?;
        }
        form = form.part(field.field_name, part);
    }
    Ok(form)
}

/// Free function backing [`RequestBuilder::resolve_request_url`]; also used
/// directly by the base service when composing a URL from a catalog entry.
pub fn resolve_request_url(service_url: &str, path_template: &str, path_params: &[(&str, &str)]) -> Result<Url> {
    if service_url.trim().is_empty() {
        return Err(Error::validation("SERVICE_URL_MISSING: the service URL is required"));
    }

    let mut base = Url::parse(service_url).map_err(|e| Error::validation(format!("invalid service URL: {e}")))?;
    let resolved_path = substitute_path_params(path_template, path_params)?;

    {
        let mut segments = base
            .path_segments_mut()
            .map_err(|_| Error::validation("service URL cannot be a base URL"))?;
        segments.pop_if_empty();
        for segment in resolved_path.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
    }

    Ok(base)
}

fn substitute_path_params(template: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| Error::validation("unterminated path parameter placeholder"))?;
        let name = &after[..end];
        let value = params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| Error::validation(format!("missing value for path parameter '{name}'")))?;
        out.push_str(&utf8_percent_encode(value, PATH_SEGMENT).to_string());
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_resolve_request_url_substitutes_path_param() {
        let url = resolve_request_url(
            "https://x.example/api",
            "v1/workspaces/{id}/message",
            &[("id", "xxxxx")],
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://x.example/api/v1/workspaces/xxxxx/message");
    }

    #[test]
    fn test_resolve_request_url_percent_encodes_param() {
        let url = resolve_request_url("https://x.example/api", "v1/items/{id}", &[("id", "a b/c")]).unwrap();
        assert_eq!(url.as_str(), "https://x.example/api/v1/items/a%20b%2Fc");
    }

    #[test]
    fn test_resolve_request_url_missing_service_url() {
        let err = resolve_request_url("", "v1/x", &[]).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("SERVICE_URL_MISSING")));
    }

    #[test]
    fn test_resolve_request_url_missing_param() {
        resolve_request_url("https://x.example", "v1/{id}", &[]).unwrap_err();
    }

    #[test]
    fn test_resolve_request_url_idempotent() {
        let a = resolve_request_url("https://x.example/api/", "v1/a/{p}/b", &[("p", "1")]).unwrap();
        let b = resolve_request_url("https://x.example/api/", "v1/a/{p}/b", &[("p", "1")]).unwrap();
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_build_fails_without_resolved_url() {
        let err = RequestBuilder::new(Method::GET).build().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_build_sets_json_content_type_and_body() {
        let spec = RequestBuilder::new(Method::POST)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .set_body_content_json(&serde_json::json!({"a": 1}))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(spec.headers.get(CONTENT_TYPE).unwrap(), JSON_CONTENT_TYPE);
        match spec.body {
            BodyContent::Bytes(b) => assert_eq!(b, br#"{"a":1}"#),
            _ => panic!("expected bytes body"),
        }
    }

    #[test]
    fn test_build_does_not_override_explicit_content_type() {
        let spec = RequestBuilder::new(Method::POST)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .add_header("Content-Type", "application/custom")
            .unwrap()
            .set_body_content_json(&serde_json::json!({}))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(spec.headers.get(CONTENT_TYPE).unwrap(), "application/custom");
    }

    #[test]
    fn test_build_form_urlencoded_when_declared() {
        let spec = RequestBuilder::new(Method::POST)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .add_header("Content-Type", FORM_URLENCODED_CONTENT_TYPE)
            .unwrap()
            .add_form_data("a", None, None, FormValue::Text("1".into()))
            .add_form_data("a", None, None, FormValue::Text("2".into()))
            .build()
            .unwrap();
        match spec.body {
            BodyContent::FormUrlEncoded(pairs) => {
                assert_eq!(pairs, vec![("a".to_string(), "1".to_string()), ("a".to_string(), "2".to_string())]);
            }
            _ => panic!("expected form-urlencoded body"),
        }
    }

    #[test]
    fn test_build_multipart_when_not_declared_urlencoded() {
        let spec = RequestBuilder::new(Method::POST)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .add_form_data(
                "file",
                Some("a.txt".into()),
                Some("text/plain".into()),
                FormValue::Bytes(b"hi".to_vec()),
            )
            .build()
            .unwrap();
        assert!(matches!(spec.body, BodyContent::Multipart(_)));
    }

    #[test]
    fn test_set_body_content_requires_exactly_one_input() {
        let builder = RequestBuilder::new(Method::POST)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap();
        let err = builder.set_body_content("application/json", None, None, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_set_body_content_json_patch_sets_content_type() {
        let patch: json_patch::Patch = serde_json::from_value(serde_json::json!([
            {"op": "replace", "path": "/a", "value": 1}
        ]))
        .unwrap();
        let spec = RequestBuilder::new(Method::PATCH)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .set_body_content("application/json", None, Some(patch), None)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(spec.headers.get(CONTENT_TYPE).unwrap(), JSON_PATCH_CONTENT_TYPE);
    }

    #[test]
    fn test_try_clone_replays_a_bytes_body() {
        let builder = RequestBuilder::new(Method::POST)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .set_body_content_json(&serde_json::json!({"a": 1}))
            .unwrap();
        let clone = builder.try_clone().unwrap();
        let spec = clone.build().unwrap();
        assert_eq!(spec.url().as_str(), "https://x.example/v1/items");
        match spec.body {
            BodyContent::Bytes(b) => assert_eq!(b, br#"{"a":1}"#),
            _ => panic!("expected bytes body"),
        }
    }

    #[test]
    fn test_try_clone_refuses_a_stream_body() {
        let builder = RequestBuilder::new(Method::POST)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .set_body_content_stream(tokio::io::empty());
        assert!(builder.try_clone().is_none());
    }

    #[test]
    fn test_add_query_preserves_duplicates_and_order() {
        let spec = RequestBuilder::new(Method::GET)
            .resolve_request_url("https://x.example", "v1/items", &[])
            .unwrap()
            .add_query("tag", "a")
            .add_query("tag", "b")
            .build()
            .unwrap();
        assert_eq!(spec.query, vec![("tag".to_string(), "a".to_string()), ("tag".to_string(), "b".to_string())]);
    }
}
