use crate::adapter::AdapterPreference;
use crate::cancel::{AbortSignal, CancelToken};
use crate::error::ConfigurationError;
use crate::headers::{HeaderBucket, HeaderConfig};
use crate::payload::Payload;
use crate::transform::{self, Transform};
use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default `Accept` header installed by [`RequestConfig::standard`]
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Default redirect limit used by the HTTP adapter when none is configured
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Tri-state configuration value.
///
/// `Inherit` takes the value from the configuration being merged into,
/// `Clear` explicitly erases it, `Set` overrides it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Setting<T> {
    #[default]
    Inherit,
    Clear,
    Set(T),
}

impl<T> Setting<T> {
    /// The effective value, if one is set.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        match self {
            Setting::Set(value) => Some(value),
            Setting::Inherit | Setting::Clear => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Setting::Set(value) => Some(value),
            Setting::Inherit | Setting::Clear => None,
        }
    }

    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Setting::Set(value) => Some(value),
            Setting::Inherit | Setting::Clear => None,
        }
    }

    /// `None` becomes an explicit `Clear`.
    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Setting::Clear, Setting::Set)
    }

    #[must_use]
    pub fn is_inherit(&self) -> bool {
        matches!(self, Setting::Inherit)
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Setting::Set(_))
    }
}

impl<T: Clone> Setting<T> {
    /// Override-wins: `over` unless it inherits.
    #[must_use]
    pub fn or_inherit(base: &Self, over: &Self) -> Self {
        match over {
            Setting::Inherit => base.clone(),
            explicit => explicit.clone(),
        }
    }
}

impl<T> From<T> for Setting<T> {
    fn from(value: T) -> Self {
        Setting::Set(value)
    }
}

/// Expected shape of the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
    Text,
    Bytes,
}

/// Predicate deciding which status codes settle a request successfully.
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(StatusCode) -> bool + Send + Sync>);

impl StatusValidator {
    pub fn new(f: impl Fn(StatusCode) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Accepts `2xx` only.
    #[must_use]
    pub fn success() -> Self {
        Self::new(|status| status.is_success())
    }

    #[must_use]
    pub fn check(&self, status: StatusCode) -> bool {
        (self.0)(status)
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusValidator(..)")
    }
}

impl PartialEq for StatusValidator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// HTTP basic credentials. Rendered into `Authorization` by the HTTP adapter.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Backward-compatibility switches.
///
/// Stored as a key/value map so unknown keys survive until validation
/// rejects them; known keys are read through typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionalOptions(Map<String, Value>);

impl TransitionalOptions {
    pub const SILENT_JSON_PARSING: &'static str = "silent_json_parsing";
    pub const FORCED_JSON_PARSING: &'static str = "forced_json_parsing";
    pub const CLARIFY_TIMEOUT_ERROR: &'static str = "clarify_timeout_error";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Swallow JSON parse failures of response bodies (default `true`).
    #[must_use]
    pub fn silent_json_parsing(&self) -> bool {
        self.flag(Self::SILENT_JSON_PARSING, true)
    }

    /// Try JSON parsing even when no response type was requested (default `true`).
    #[must_use]
    pub fn forced_json_parsing(&self) -> bool {
        self.flag(Self::FORCED_JSON_PARSING, true)
    }

    /// Report adapter timeouts as `TimedOut` instead of `ConnectionAborted` (default `false`).
    #[must_use]
    pub fn clarify_timeout_error(&self) -> bool {
        self.flag(Self::CLARIFY_TIMEOUT_ERROR, false)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Per-key merge, `over` wins.
    #[must_use]
    pub fn merged(base: &Self, over: &Self) -> Self {
        let mut merged = base.0.clone();
        for (key, value) in &over.0 {
            merged.insert(key.clone(), value.clone());
        }
        Self(merged)
    }
}

impl From<Map<String, Value>> for TransitionalOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Replaces the built-in percent-encoding of query keys and values.
pub type ParamEncoder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Replaces the built-in query-string serialization entirely.
pub type ParamSerializer =
    Arc<dyn Fn(&Map<String, Value>, &ParamsSerializerOptions) -> String + Send + Sync>;

/// Query-string serialization options.
///
/// `options` holds declarative switches (`indexes`, `dots`, ...) validated
/// before dispatch; the closures override encoding or serialization.
#[derive(Clone, Default)]
pub struct ParamsSerializerOptions {
    pub encode: Option<ParamEncoder>,
    pub serialize: Option<ParamSerializer>,
    pub options: Map<String, Value>,
}

impl ParamsSerializerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_encoder(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.encode = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_serializer(
        mut self,
        f: impl Fn(&Map<String, Value>, &ParamsSerializerOptions) -> String + Send + Sync + 'static,
    ) -> Self {
        self.serialize = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Array key style: `None` → `k`, `Some(false)` → `k[]`, `Some(true)` → `k[0]`.
    #[must_use]
    pub fn indexes(&self) -> Option<bool> {
        match self.options.get("indexes") {
            Some(Value::Bool(flag)) => Some(*flag),
            Some(Value::Null) => None,
            _ => Some(false),
        }
    }
}

impl fmt::Debug for ParamsSerializerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamsSerializerOptions")
            .field("encode", &self.encode.as_ref().map(|_| ".."))
            .field("serialize", &self.serialize.as_ref().map(|_| ".."))
            .field("options", &self.options)
            .finish()
    }
}

impl PartialEq for ParamsSerializerOptions {
    fn eq(&self, other: &Self) -> bool {
        fn same<T: ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(self.encode.as_ref(), other.encode.as_ref())
            && same(self.serialize.as_ref(), other.serialize.as_ref())
            && self.options == other.options
    }
}

/// Description of one request, or of instance defaults.
///
/// Every option is optional; a configuration becomes a *resolved*
/// configuration once merged with client defaults, at which point `method`
/// is set and headers are flat. Options not modelled here travel in
/// `extensions` and are merged override-wins per key.
///
/// ```ignore
/// let config = RequestConfig::new()
///     .url("/users")
///     .method(Method::POST)
///     .header("x-request-id", "abc")
///     .data(json!({"name": "alice"}))
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    pub url: Setting<String>,
    pub base_url: Setting<String>,
    pub method: Setting<Method>,
    pub headers: HeaderConfig,
    pub params: Setting<Map<String, Value>>,
    pub params_serializer: Setting<ParamsSerializerOptions>,
    pub data: Setting<Payload>,
    pub timeout: Setting<Duration>,
    pub timeout_error_message: Setting<String>,
    pub transform_request: Setting<Vec<Transform>>,
    pub transform_response: Setting<Vec<Transform>>,
    pub adapter: Setting<AdapterPreference>,
    pub validate_status: Setting<StatusValidator>,
    pub cancel_token: Setting<CancelToken>,
    pub signal: Setting<AbortSignal>,
    pub transitional: TransitionalOptions,
    pub response_type: Setting<ResponseType>,
    pub max_content_length: Setting<usize>,
    pub max_redirects: Setting<usize>,
    pub auth: Setting<BasicAuth>,
    pub extensions: Map<String, Value>,
    /// Error captured by a builder method (surfaced by validation)
    pub(crate) deferred_error: Option<ConfigurationError>,
}

impl RequestConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults of a JSON-speaking client: JSON request/response transforms
    /// and a permissive `Accept` header for every method.
    #[must_use]
    pub fn standard() -> Self {
        let mut config = Self::new();
        config.transform_request = Setting::Set(vec![transform::json_request()]);
        config.transform_response = Setting::Set(vec![transform::json_response()]);
        config.header_in(HeaderBucket::Common, "accept", DEFAULT_ACCEPT)
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Setting::Set(url.into());
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Setting::Set(base_url.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Setting::Set(method);
        self
    }

    /// Set the method from a string, case-insensitively (`"post"` → `POST`).
    #[must_use]
    pub fn method_str(mut self, method: &str) -> Self {
        match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
            Ok(method) => self.method = Setting::Set(method),
            Err(e) => self.defer(ConfigurationError::invalid("method", e.to_string())),
        }
        self
    }

    /// Add a flat header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Err(e) = self.headers.insert(name, value) {
            self.defer(ConfigurationError::invalid("headers", e.to_string()));
        }
        self
    }

    /// Add a header that only applies to requests resolved to `bucket`.
    #[must_use]
    pub fn header_in(mut self, bucket: HeaderBucket, name: &str, value: &str) -> Self {
        if let Err(e) = self.headers.insert_in(bucket, name, value) {
            self.defer(ConfigurationError::invalid("headers", e.to_string()));
        }
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: impl Into<HeaderConfig>) -> Self {
        self.headers = headers.into();
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.params.is_set() {
            self.params = Setting::Set(Map::new());
        }
        if let Some(params) = self.params.get_mut() {
            params.insert(key.into(), value.into());
        }
        self
    }

    #[must_use]
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Setting::Set(params);
        self
    }

    #[must_use]
    pub fn params_serializer(mut self, options: ParamsSerializerOptions) -> Self {
        self.params_serializer = Setting::Set(options);
        self
    }

    #[must_use]
    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Setting::Set(data.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Setting::Set(timeout);
        self
    }

    #[must_use]
    pub fn timeout_error_message(mut self, message: impl Into<String>) -> Self {
        self.timeout_error_message = Setting::Set(message.into());
        self
    }

    #[must_use]
    pub fn transform_request(mut self, chain: Vec<Transform>) -> Self {
        self.transform_request = Setting::Set(chain);
        self
    }

    #[must_use]
    pub fn transform_response(mut self, chain: Vec<Transform>) -> Self {
        self.transform_response = Setting::Set(chain);
        self
    }

    #[must_use]
    pub fn adapter(mut self, preference: impl Into<AdapterPreference>) -> Self {
        self.adapter = Setting::Set(preference.into());
        self
    }

    /// Decide which statuses settle successfully (default: 2xx).
    ///
    /// Applies to this request only: validators are never inherited from
    /// instance defaults.
    #[must_use]
    pub fn validate_status(
        mut self,
        f: impl Fn(StatusCode) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validate_status = Setting::Set(StatusValidator::new(f));
        self
    }

    /// Settle successfully regardless of status. Per request only, like
    /// [`RequestConfig::validate_status`].
    #[must_use]
    pub fn accept_any_status(mut self) -> Self {
        self.validate_status = Setting::Clear;
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Setting::Set(token);
        self
    }

    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Setting::Set(signal);
        self
    }

    #[must_use]
    pub fn transitional(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.transitional.set(key, value);
        self
    }

    #[must_use]
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Setting::Set(response_type);
        self
    }

    #[must_use]
    pub fn max_content_length(mut self, limit: usize) -> Self {
        self.max_content_length = Setting::Set(limit);
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, limit: usize) -> Self {
        self.max_redirects = Setting::Set(limit);
        self
    }

    #[must_use]
    pub fn auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Setting::Set(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Error recorded by a builder method, if any.
    #[must_use]
    pub fn deferred_error(&self) -> Option<&ConfigurationError> {
        self.deferred_error.as_ref()
    }

    /// Keep the first error only.
    fn defer(&mut self, err: ConfigurationError) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(err);
        }
    }
}

impl From<&str> for RequestConfig {
    fn from(url: &str) -> Self {
        Self::new().url(url)
    }
}

impl From<String> for RequestConfig {
    fn from(url: String) -> Self {
        Self::new().url(url)
    }
}
