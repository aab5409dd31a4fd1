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

//! Discovery of authenticator configuration from a credentials file, the
//! process environment and a JSON service-binding blob.

use std::env;
use std::path::{Path, PathBuf};

use serde_json::Value;

const CREDENTIALS_FILE_ENV: &str = "IBM_CREDENTIALS_FILE";
const DEFAULT_CREDENTIALS_FILE_NAME: &str = "ibm-credentials.env";
const VCAP_SERVICES_ENV: &str = "VCAP_SERVICES";

/// An ordered, case-canonicalized property map for a single named service.
///
/// Keys are canonicalized to lower snake_case on insertion (`AUTH_TYPE` and
/// `auth-type` both land under `auth_type`), so callers never have to guess
/// which casing a given source used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceProperties {
    entries: Vec<(String, String)>,
}

impl ServiceProperties {
    /// An empty property map.
    pub fn new() -> ServiceProperties {
        ServiceProperties { entries: Vec::new() }
    }

    /// `true` if no properties were collected for the service.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite a property, canonicalizing its name.
    pub fn insert<K: AsRef<str>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = canonicalize(key.as_ref());
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value.into();
        } else {
            self.entries.push((key, value.into()));
        }
    }

    /// Look a property up by name (case/separator insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = canonicalize(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look a property up and parse it as a boolean (`true`/`false`,
    /// case-insensitive).
    pub fn get_bool(&self, key: &str) -> crate::error::Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .parse::<bool>()
                .map(Some)
                .map_err(|_| crate::error::Error::validation(format!("{key} is not a valid boolean: {v}"))),
        }
    }

    /// Iterate over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn canonicalize(key: &str) -> String {
    key.trim().to_lowercase().replace('-', "_")
}

/// Resolve the flat property map for `service_name`, trying the credentials
/// file, then the environment, then `VCAP_SERVICES`, in that order. The
/// first source that yields any properties wins outright; sources are never
/// merged. Returns `None` (not an error) when no source has anything for
/// this service.
pub fn get_service_properties(service_name: &str) -> Option<ServiceProperties> {
    if let Some(props) = from_credentials_file(service_name) {
        log::debug!("resolved properties for '{service_name}' from the credentials file");
        return Some(props);
    }
    if let Some(props) = from_environment(service_name) {
        log::debug!("resolved properties for '{service_name}' from the environment");
        return Some(props);
    }
    if let Some(props) = from_vcap_services(service_name) {
        log::debug!("resolved properties for '{service_name}' from VCAP_SERVICES");
        return Some(props);
    }
    None
}

fn service_key_prefix(service_name: &str) -> String {
    format!("{}_", service_name.to_uppercase().replace('-', "_"))
}

/// Parse `NAME=value` pairs belonging to `service_name` out of `text`.
fn parse_key_value_text(text: &str, service_name: &str) -> ServiceProperties {
    let prefix = service_key_prefix(service_name);
    let mut props = ServiceProperties::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if let Some(suffix) = name.strip_prefix(&prefix) {
            props.insert(suffix, value.to_string());
        }
    }
    props
}

fn find_credentials_file() -> Option<PathBuf> {
    if let Ok(path) = env::var(CREDENTIALS_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let cwd = PathBuf::from(".").join(DEFAULT_CREDENTIALS_FILE_NAME);
    if cwd.is_file() {
        return Some(cwd);
    }

    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(DEFAULT_CREDENTIALS_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
    } else {
        log::warn!("cannot determine the home directory while looking for a credentials file");
    }

    None
}

fn from_credentials_file(service_name: &str) -> Option<ServiceProperties> {
    let path = find_credentials_file()?;
    from_credentials_file_at(&path, service_name)
}

fn from_credentials_file_at(path: &Path, service_name: &str) -> Option<ServiceProperties> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let props = parse_key_value_text(&text, service_name);
            if props.is_empty() {
                None
            } else {
                Some(props)
            }
        }
        Err(e) => {
            log::warn!("cannot read credentials file {}: {}", path.display(), e);
            None
        }
    }
}

fn from_environment(service_name: &str) -> Option<ServiceProperties> {
    let prefix = service_key_prefix(service_name);
    let mut props = ServiceProperties::new();
    for (name, value) in env::vars() {
        if let Some(suffix) = name.strip_prefix(&prefix) {
            props.insert(suffix, value);
        }
    }
    if props.is_empty() {
        None
    } else {
        Some(props)
    }
}

fn from_vcap_services(service_name: &str) -> Option<ServiceProperties> {
    let raw = env::var(VCAP_SERVICES_ENV).ok()?;
    let root: Value = serde_json::from_str(&raw).ok()?;
    from_vcap_value(&root, service_name)
}

fn from_vcap_value(root: &Value, service_name: &str) -> Option<ServiceProperties> {
    let categories = root.as_object()?;

    // First pass: match on the entry's own `name`.
    for entries in categories.values() {
        if let Some(entry) = find_vcap_entry_by_name(entries, service_name) {
            return Some(credentials_to_properties(entry));
        }
    }

    // Second pass: match on the category key itself.
    for (category, entries) in categories {
        if category.eq_ignore_ascii_case(service_name) {
            if let Some(entry) = entries.as_array().and_then(|a| a.first()) {
                return Some(credentials_to_properties(entry));
            }
        }
    }

    None
}

fn find_vcap_entry_by_name<'a>(entries: &'a Value, service_name: &str) -> Option<&'a Value> {
    entries.as_array()?.iter().find(|entry| {
        entry
            .get("name")
            .and_then(Value::as_str)
            .map(|n| n.eq_ignore_ascii_case(service_name))
            .unwrap_or(false)
    })
}

fn credentials_to_properties(entry: &Value) -> ServiceProperties {
    let mut props = ServiceProperties::new();
    let Some(credentials) = entry.get("credentials").and_then(Value::as_object) else {
        return props;
    };

    for (key, value) in credentials {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        props.insert(key, value);
    }

    synthesize_auth_type(&mut props);
    props
}

fn synthesize_auth_type(props: &mut ServiceProperties) {
    if props.get("auth_type").is_some() || props.get("auth_provider").is_some() {
        return;
    }
    if props.get("apikey").is_some() {
        props.insert("auth_type", "iam");
    } else if props.get("username").is_some() && props.get("password").is_some() {
        props.insert("auth_type", "basic");
    }
}
