//! Declarative client defaults.
//!
//! [`ClientSettings`] is the serde shape of instance defaults, so they can
//! live in the application's YAML/env configuration and be loaded through
//! `figment`:
//!
//! ```yaml
//! request:
//!   base_url: https://api.example.com
//!   timeout_ms: 5000
//!   headers:
//!     x-tenant: acme
//!     common:
//!       accept: application/json
//!     post:
//!       content-type: application/json
//!   transitional:
//!     clarify_timeout_error: true
//! ```

use crate::adapter::AdapterPreference;
use crate::config::{BasicAuth, ParamsSerializerOptions, RequestConfig, ResponseType, Setting};
use crate::error::ConfigurationError;
use crate::headers::{HeaderBucket, HeaderConfig};
use figment::Figment;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// One entry of the `headers` section: a value, or a bucket of values keyed
/// by `common` or a method name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HeaderSetting {
    Value(String),
    Bucket(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSettings {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Serializable instance defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSettings {
    pub base_url: Option<String>,
    /// Default method, case-insensitive
    pub method: Option<String>,
    /// Adapter timeout in milliseconds; `0` disables it
    pub timeout_ms: Option<u64>,
    pub timeout_error_message: Option<String>,
    pub headers: BTreeMap<String, HeaderSetting>,
    pub params: Map<String, Value>,
    pub params_serializer: Map<String, Value>,
    /// Adapter preference, first resolvable name wins
    pub adapter: Vec<String>,
    pub response_type: Option<ResponseType>,
    pub max_content_length: Option<usize>,
    pub max_redirects: Option<usize>,
    pub auth: Option<AuthSettings>,
    pub transitional: Map<String, Value>,
}

impl ClientSettings {
    /// Extract settings stored under `key` (e.g. `"request"`).
    ///
    /// # Errors
    /// Returns `ConfigurationError` naming `key` when extraction fails.
    pub fn from_figment(figment: &Figment, key: &str) -> Result<Self, ConfigurationError> {
        figment
            .extract_inner(key)
            .map_err(|e| ConfigurationError::invalid(key, e.to_string()))
    }

    /// Convert into a [`RequestConfig`] usable as client defaults.
    ///
    /// Only present values are set; everything else inherits.
    ///
    /// # Errors
    /// Returns `ConfigurationError` for unknown header buckets, invalid
    /// header names or values, and invalid methods.
    pub fn into_request_config(self) -> Result<RequestConfig, ConfigurationError> {
        let mut config = RequestConfig::new();

        if let Some(base_url) = self.base_url {
            config.base_url = Setting::Set(base_url);
        }
        if let Some(method) = self.method {
            config = config.method_str(&method);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout = Setting::Set(Duration::from_millis(ms));
        }
        if let Some(message) = self.timeout_error_message {
            config.timeout_error_message = Setting::Set(message);
        }
        config.headers = header_config(self.headers)?;
        if !self.params.is_empty() {
            config.params = Setting::Set(self.params);
        }
        if !self.params_serializer.is_empty() {
            config.params_serializer = Setting::Set(ParamsSerializerOptions {
                options: self.params_serializer,
                ..ParamsSerializerOptions::default()
            });
        }
        if !self.adapter.is_empty() {
            config.adapter = Setting::Set(AdapterPreference::names(self.adapter));
        }
        if let Some(response_type) = self.response_type {
            config.response_type = Setting::Set(response_type);
        }
        if let Some(limit) = self.max_content_length {
            config.max_content_length = Setting::Set(limit);
        }
        if let Some(limit) = self.max_redirects {
            config.max_redirects = Setting::Set(limit);
        }
        if let Some(auth) = self.auth {
            config.auth = Setting::Set(BasicAuth {
                username: auth.username,
                password: auth.password,
            });
        }
        config.transitional = self.transitional.into();

        match config.deferred_error.take() {
            Some(err) => Err(err),
            None => Ok(config),
        }
    }
}

fn header_config(
    headers: BTreeMap<String, HeaderSetting>,
) -> Result<HeaderConfig, ConfigurationError> {
    let mut config = HeaderConfig::new();
    let invalid = |key: &str, reason: String| ConfigurationError::invalid(format!("headers.{key}"), reason);

    for (key, setting) in headers {
        match setting {
            HeaderSetting::Value(value) => config
                .insert(&key, &value)
                .map_err(|e| invalid(&key, e.to_string()))?,
            HeaderSetting::Bucket(values) => {
                let bucket = HeaderBucket::from_key(&key)
                    .ok_or_else(|| invalid(&key, "not a header bucket".to_owned()))?;
                for (name, value) in values {
                    config
                        .insert_in(bucket, &name, &value)
                        .map_err(|e| invalid(&key, e.to_string()))?;
                }
            }
        }
    }
    Ok(config)
}
