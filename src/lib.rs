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

//! Core authentication and request runtime shared by IBM Cloud service SDKs.
//!
//! A generated service client is expected to hold a [`service::BaseService`]
//! built from an [`auth::Authenticator`] (either constructed directly or
//! resolved from configuration via [`auth::get_authenticator_from_environment`])
//! and to compose each call through a [`request::RequestBuilder`].

pub mod auth;
pub mod config;
pub mod error;
pub mod request;
pub mod service;
pub mod token;
pub mod utils;

pub use error::{Error, Result};
