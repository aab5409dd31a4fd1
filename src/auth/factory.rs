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

//! Given a service name, resolve its configuration and instantiate the
//! right [`Authenticator`] variant.

use std::sync::Arc;

use super::{AuthenticationType, Authenticator, BasicAuthenticator, BearerTokenAuthenticator, ContainerAuthenticator, Cp4dAuthenticator, IamAuthenticator, NoAuthAuthenticator, VpcInstanceAuthenticator};
use crate::config::{get_service_properties, ServiceProperties};
use crate::error::{Error, Result};

/// Resolve configuration for `service_name` and build its authenticator.
///
/// Returns `Ok(None)` when no configuration source has anything for this
/// service (not an error); returns `Err` when properties were found but are
/// invalid, or the `auth_type` could not be determined or is unrecognized.
pub fn get_authenticator_from_environment(service_name: &str) -> Result<Option<Arc<dyn Authenticator>>> {
    let Some(props) = get_service_properties(service_name) else {
        return Ok(None);
    };

    let auth_type = resolve_auth_type(&props)?;
    let authenticator = build_authenticator(auth_type, &props)?;
    authenticator.validate()?;
    Ok(Some(authenticator))
}

fn normalize_auth_type(raw: &str) -> Option<AuthenticationType> {
    let key: String = raw.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
    match key.as_str() {
        "noauth" => Some(AuthenticationType::NoAuth),
        "basic" => Some(AuthenticationType::Basic),
        "bearertoken" | "bearer" => Some(AuthenticationType::BearerToken),
        "cp4d" | "cloudpak4data" | "cloudpakfordata" => Some(AuthenticationType::Cp4d),
        "iam" => Some(AuthenticationType::Iam),
        "container" => Some(AuthenticationType::Container),
        "vpc" | "vpcinstance" => Some(AuthenticationType::Vpc),
        _ => None,
    }
}

fn resolve_auth_type(props: &ServiceProperties) -> Result<AuthenticationType> {
    if let Some(raw) = props.get("auth_type").or_else(|| props.get("auth_provider")) {
        return normalize_auth_type(raw).ok_or_else(|| Error::validation(format!("unrecognized auth_type '{raw}'")));
    }

    if props.get("apikey").is_some() {
        return Ok(AuthenticationType::Iam);
    }
    if props.get("username").is_some() && props.get("password").is_some() {
        return Ok(AuthenticationType::Basic);
    }
    if props.get("iam_profile_name").is_some() || props.get("iam_profile_id").is_some() {
        return Ok(AuthenticationType::Container);
    }

    Err(Error::validation(
        "cannot determine auth_type for this service: no auth_type is set and no recognizable credential fields were found",
    ))
}

fn disable_ssl(props: &ServiceProperties, key: &str) -> Result<bool> {
    Ok(props.get_bool(key)?.unwrap_or(false))
}

fn build_authenticator(auth_type: AuthenticationType, props: &ServiceProperties) -> Result<Arc<dyn Authenticator>> {
    match auth_type {
        AuthenticationType::NoAuth => Ok(Arc::new(NoAuthAuthenticator::new())),

        AuthenticationType::Basic => {
            let username = props.get("username").unwrap_or_default();
            let password = props.get("password").unwrap_or_default();
            Ok(Arc::new(BasicAuthenticator::new(username, password)?))
        }

        AuthenticationType::BearerToken => {
            let token = props.get("bearer_token").unwrap_or_default();
            Ok(Arc::new(BearerTokenAuthenticator::new(token)?))
        }

        AuthenticationType::Cp4d => {
            let url = props.get("auth_url").or_else(|| props.get("url")).unwrap_or_default();
            let username = props.get("username").unwrap_or_default();
            let password = props.get("password").map(str::to_string);
            let apikey = props.get("apikey").map(str::to_string);
            Ok(Arc::new(Cp4dAuthenticator::new(
                url,
                username,
                password,
                apikey,
                Vec::new(),
                disable_ssl(props, "auth_disable_ssl")?,
            )?))
        }

        AuthenticationType::Iam => {
            let url = props.get("auth_url").map(str::to_string);
            let client_id = props.get("client_id").map(str::to_string);
            let client_secret = props.get("client_secret").map(str::to_string);
            let scope = props.get("scope").map(str::to_string);
            let ssl_disabled = disable_ssl(props, "auth_disable_ssl")?;

            if let Some(apikey) = props.get("apikey") {
                Ok(Arc::new(IamAuthenticator::from_api_key(apikey, url, client_id, client_secret, scope, ssl_disabled)?))
            } else if let Some(refresh_token) = props.get("refresh_token") {
                Ok(Arc::new(IamAuthenticator::from_refresh_token(
                    refresh_token,
                    url,
                    client_id,
                    client_secret,
                    scope,
                    ssl_disabled,
                )?))
            } else {
                Err(Error::validation("IAM authentication requires either apikey or refresh_token"))
            }
        }

        AuthenticationType::Container => Ok(Arc::new(ContainerAuthenticator::new(
            props.get("iam_profile_name").map(str::to_string),
            props.get("iam_profile_id").map(str::to_string),
            props.get("cr_token_filename").map(str::to_string),
            props.get("instance_metadata_service_url").map(str::to_string),
            props.get("auth_url").map(str::to_string),
            props.get("client_id").map(str::to_string),
            props.get("client_secret").map(str::to_string),
            props.get("scope").map(str::to_string),
            disable_ssl(props, "auth_disable_ssl")?,
        )?)),

        AuthenticationType::Vpc => Ok(Arc::new(VpcInstanceAuthenticator::new(
            props.get("iam_profile_crn").map(str::to_string),
            props.get("iam_profile_id").map(str::to_string),
            props.get("instance_metadata_service_url").or_else(|| props.get("url")).map(str::to_string),
        )?)),
    }
}
