use crate::adapter::{Adapter, AdapterRegistry, HttpAdapter, HttpAdapterConfig};
use crate::config::{RequestConfig, Setting};
use crate::dispatch::dispatch_request;
use crate::error::{ConfigurationError, RequestError};
use crate::interceptor::{Interceptor, Interceptors, SyncPair, run_chain, run_sync_chain};
use crate::merge::merge_config;
use crate::payload::Payload;
use crate::response::Response;
use crate::settings::ClientSettings;
use crate::uri;
use crate::validator::{validate_params_serializer, validate_transitional};
use futures::FutureExt;
use futures::future::BoxFuture;
use http::Method;
use parking_lot::RwLock;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// What a call to [`Client::request`] targets: a URL, a configuration, or both.
#[derive(Debug, Clone, Default)]
pub struct RequestTarget(RequestConfig);

impl RequestTarget {
    #[must_use]
    pub fn into_config(self) -> RequestConfig {
        self.0
    }
}

impl From<&str> for RequestTarget {
    fn from(url: &str) -> Self {
        Self(RequestConfig::new().url(url))
    }
}

impl From<String> for RequestTarget {
    fn from(url: String) -> Self {
        Self(RequestConfig::new().url(url))
    }
}

impl From<RequestConfig> for RequestTarget {
    fn from(config: RequestConfig) -> Self {
        Self(config)
    }
}

impl From<(&str, RequestConfig)> for RequestTarget {
    fn from((url, config): (&str, RequestConfig)) -> Self {
        Self(config.url(url))
    }
}

impl From<(String, RequestConfig)> for RequestTarget {
    fn from((url, config): (String, RequestConfig)) -> Self {
        Self(config.url(url))
    }
}

/// How the request-side interceptors of one call were executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Every selected request interceptor ran inside [`Client::prepare`]
    Synchronous,
    /// Request interceptors run as part of the returned future
    Asynchronous,
}

/// Request orchestrator.
///
/// Holds instance defaults, the request and response interceptor registries
/// and the adapter registry. Every call merges its configuration over the
/// defaults, runs the interceptor chains around the dispatcher and settles
/// exactly once.
///
/// # Thread Safety
///
/// `Client` is `Clone + Send + Sync`; clones share defaults, interceptors and
/// adapters. Concurrent requests never contend on request state: each one
/// works on its own merged copy of the configuration and a snapshot of the
/// interceptor chains.
///
/// # Example
///
/// ```ignore
/// let client = Client::builder()
///     .defaults(RequestConfig::standard())
///     .base_url("https://api.example.com")
///     .timeout(Duration::from_secs(5))
///     .build()?;
///
/// client.interceptors().request.register(
///     Interceptor::new(|config: RequestConfig| Ok(config.header("x-request-id", "42")))
///         .synchronous(true),
/// );
///
/// let users: Vec<User> = client.get("/users", RequestConfig::new()).await?.json()?;
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    defaults: Arc<RwLock<RequestConfig>>,
    interceptors: Arc<Interceptors>,
    registry: Arc<AdapterRegistry>,
}

impl Client {
    /// Client with empty defaults and the HTTP adapter registered.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, RequestError> {
        ClientBuilder::new().build()
    }

    /// Client with [`RequestConfig::standard`] defaults (JSON transforms and
    /// a permissive `Accept` header).
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn standard() -> Result<Self, RequestError> {
        ClientBuilder::new().defaults(RequestConfig::standard()).build()
    }

    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    fn from_parts(defaults: RequestConfig, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            defaults: Arc::new(RwLock::new(defaults)),
            interceptors: Arc::new(Interceptors::default()),
            registry,
        }
    }

    #[must_use]
    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Copy of the current instance defaults.
    #[must_use]
    pub fn defaults(&self) -> RequestConfig {
        self.defaults.read().clone()
    }

    /// Edit the instance defaults. Requests already prepared keep the
    /// defaults they were merged with.
    ///
    /// `update` runs on a copy with no lock held, so it may call back into
    /// the client; concurrent updates are last-writer-wins. A status
    /// validator set here is dropped with a warning.
    pub fn update_defaults(&self, update: impl FnOnce(&mut RequestConfig)) {
        let mut defaults = self.defaults();
        update(&mut defaults);
        drop_status_validator(&mut defaults);
        *self.defaults.write() = defaults;
    }

    /// New client whose defaults are this client's defaults merged with
    /// `config`. Interceptors start empty; the adapter registry is shared.
    ///
    /// A status validator in `config` is dropped with a warning; validators
    /// only apply per request.
    #[must_use]
    pub fn create(&self, config: RequestConfig) -> Client {
        let mut defaults = merge_config(&self.defaults.read(), &config);
        drop_status_validator(&mut defaults);
        Self::from_parts(defaults, Arc::clone(&self.registry))
    }

    /// Render the final URL of `config` merged over the defaults. No I/O, no
    /// interceptors.
    #[must_use]
    pub fn get_uri(&self, config: RequestConfig) -> String {
        let merged = merge_config(&self.defaults.read(), &config);
        uri::get_uri(&merged)
    }

    /// Resolve the configuration and build the interceptor chains.
    ///
    /// Everything before dispatch that needs no suspension happens here:
    /// merging, option validation, method resolution, header flattening and,
    /// when every selected request interceptor is synchronous, running them.
    ///
    /// # Errors
    /// `RequestError::Configuration` for invalid options; in synchronous mode
    /// also the error of a failing request interceptor its rejected handler
    /// did not recover from. Nothing has been dispatched in either case.
    pub fn prepare(
        &self,
        target: impl Into<RequestTarget>,
    ) -> Result<PendingRequest, RequestError> {
        let call = target.into().into_config();
        let mut config = merge_config(&self.defaults.read(), &call);

        if let Some(err) = config.deferred_error.take() {
            return Err(err.into());
        }
        validate_transitional(&config.transitional)?;
        if let Some(options) = config.params_serializer.get() {
            validate_params_serializer(options)?;
        }

        let method = config.method.get().cloned().unwrap_or(Method::GET);
        config.headers = config.headers.flatten(&method);
        config.method = Setting::Set(method);

        let request_chain: Vec<Arc<Interceptor<RequestConfig>>> = self
            .interceptors
            .request
            .snapshot()
            .into_iter()
            .filter(|interceptor| interceptor.applies_to(&config))
            .rev()
            .collect();
        let response_chain: Vec<Arc<Interceptor<Response>>> = self
            .interceptors
            .response
            .snapshot()
            .into_iter()
            .filter(|interceptor| interceptor.applies_to(&config))
            .collect();

        let sync_chain: Option<Vec<SyncPair<RequestConfig>>> = request_chain
            .iter()
            .map(|interceptor| interceptor.sync_pair())
            .collect();

        let mode = if sync_chain.is_some() {
            ExecutionMode::Synchronous
        } else {
            ExecutionMode::Asynchronous
        };
        tracing::debug!(
            method = ?config.method.get(),
            url = config.url.get().map_or("", String::as_str),
            ?mode,
            request_interceptors = request_chain.len(),
            response_interceptors = response_chain.len(),
            "request prepared"
        );

        let stage = match sync_chain {
            Some(chain) => Stage::Ready(run_sync_chain(&chain, config)?),
            None => Stage::Intercept(config, request_chain),
        };

        Ok(PendingRequest {
            stage,
            response_chain,
            registry: Arc::clone(&self.registry),
        })
    }

    /// Send one request.
    ///
    /// # Errors
    /// Any [`RequestError`]: configuration errors before I/O, interceptor
    /// failures, cancellation, adapter resolution, transform and transport
    /// failures.
    pub async fn request(
        &self,
        target: impl Into<RequestTarget>,
    ) -> Result<Response, RequestError> {
        self.prepare(target)?.send().await
    }

    async fn with_method(
        &self,
        method: Method,
        url: String,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.request(config.method(method).url(url)).await
    }

    async fn with_body(
        &self,
        method: Method,
        url: String,
        data: Payload,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.request(config.method(method).url(url).data(data)).await
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn get(
        &self,
        url: impl Into<String>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.with_method(Method::GET, url.into(), config).await
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn delete(
        &self,
        url: impl Into<String>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.with_method(Method::DELETE, url.into(), config).await
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn head(
        &self,
        url: impl Into<String>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.with_method(Method::HEAD, url.into(), config).await
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn options(
        &self,
        url: impl Into<String>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.with_method(Method::OPTIONS, url.into(), config).await
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn post(
        &self,
        url: impl Into<String>,
        data: impl Into<Payload>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.with_body(Method::POST, url.into(), data.into(), config).await
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn put(
        &self,
        url: impl Into<String>,
        data: impl Into<Payload>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.with_body(Method::PUT, url.into(), data.into(), config).await
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn patch(
        &self,
        url: impl Into<String>,
        data: impl Into<Payload>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.with_body(Method::PATCH, url.into(), data.into(), config).await
    }

    /// `post` with `Content-Type: multipart/form-data`. The body must already
    /// be encoded by the caller or a request transform.
    ///
    /// # Errors
    /// See [`Client::request`].
    pub async fn post_form(
        &self,
        url: impl Into<String>,
        data: impl Into<Payload>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.post(url, data, config.header("content-type", MULTIPART_FORM_DATA)).await
    }

    /// `put` with `Content-Type: multipart/form-data`.
    ///
    /// # Errors
    /// See [`Client::request`].
    pub async fn put_form(
        &self,
        url: impl Into<String>,
        data: impl Into<Payload>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.put(url, data, config.header("content-type", MULTIPART_FORM_DATA)).await
    }

    /// `patch` with `Content-Type: multipart/form-data`.
    ///
    /// # Errors
    /// See [`Client::request`].
    pub async fn patch_form(
        &self,
        url: impl Into<String>,
        data: impl Into<Payload>,
        config: RequestConfig,
    ) -> Result<Response, RequestError> {
        self.patch(url, data, config.header("content-type", MULTIPART_FORM_DATA)).await
    }
}

/// `validate_status` is never inherited from instance defaults.
fn drop_status_validator(defaults: &mut RequestConfig) {
    if !defaults.validate_status.is_inherit() {
        tracing::warn!("validate_status ignored on instance defaults; set it per request");
        defaults.validate_status = Setting::Inherit;
    }
}

enum Stage {
    /// Request interceptors already ran synchronously
    Ready(RequestConfig),
    /// Request interceptors still to run, in chain order
    Intercept(RequestConfig, Vec<Arc<Interceptor<RequestConfig>>>),
}

/// A prepared request: configuration resolved, chains built.
///
/// Await it (or call [`PendingRequest::send`]) to run the asynchronous
/// remainder: pending request interceptors, dispatch and response
/// interceptors.
pub struct PendingRequest {
    stage: Stage,
    response_chain: Vec<Arc<Interceptor<Response>>>,
    registry: Arc<AdapterRegistry>,
}

impl PendingRequest {
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        match self.stage {
            Stage::Ready(_) => ExecutionMode::Synchronous,
            Stage::Intercept(..) => ExecutionMode::Asynchronous,
        }
    }

    /// Configuration as it stands before any pending request interceptor.
    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        match &self.stage {
            Stage::Ready(config) | Stage::Intercept(config, _) => config,
        }
    }

    /// # Errors
    /// See [`Client::request`].
    pub async fn send(self) -> Result<Response, RequestError> {
        let span = tracing::debug_span!(
            "request",
            method = ?self.config().method.get(),
            url = self.config().url.get().map_or("", String::as_str),
        );
        let Self {
            stage,
            response_chain,
            registry,
        } = self;

        async move {
            let config = match stage {
                Stage::Ready(config) => Ok(config),
                Stage::Intercept(config, chain) => run_chain(&chain, Ok(config)).await,
            };
            let settled = match config {
                Ok(config) => dispatch_request(config, &registry).await,
                Err(err) => Err(err),
            };
            let result = run_chain(&response_chain, settled).await;
            match &result {
                Ok(response) => tracing::debug!(status = response.status.as_u16(), "request settled"),
                Err(err) => tracing::debug!(error = %err, "request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl IntoFuture for PendingRequest {
    type Output = Result<Response, RequestError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().boxed()
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("mode", &self.mode())
            .field("config", self.config())
            .field("response_interceptors", &self.response_chain.len())
            .finish_non_exhaustive()
    }
}

/// Wait for every request, failing fast on the first error.
///
/// # Errors
/// The first error any of the requests settles with.
pub async fn all<I, F, T>(requests: I) -> Result<Vec<T>, RequestError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, RequestError>>,
{
    futures::future::try_join_all(requests).await
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    defaults: RequestConfig,
    http: Option<HttpAdapterConfig>,
    adapters: Vec<Arc<dyn Adapter>>,
    unavailable: Vec<String>,
    error: Option<RequestError>,
}

impl ClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            defaults: RequestConfig::new(),
            http: Some(HttpAdapterConfig::default()),
            adapters: Vec::new(),
            unavailable: Vec::new(),
            error: None,
        }
    }

    /// Replace the instance defaults.
    ///
    /// `validate_status` only applies per request; defaults carrying one make
    /// [`ClientBuilder::build`] fail.
    #[must_use]
    pub fn defaults(mut self, defaults: RequestConfig) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.defaults.base_url = Setting::Set(base_url.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Setting::Set(timeout);
        self
    }

    /// Add a flat default header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.defaults = self.defaults.header(name, value);
        self
    }

    /// Merge declarative settings over the current defaults.
    #[must_use]
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        match settings.into_request_config() {
            Ok(config) => self.defaults = merge_config(&self.defaults, &config),
            Err(e) => {
                self.error.get_or_insert(e.into());
            }
        }
        self
    }

    /// Register an adapter. Registered after the HTTP adapter, so an
    /// adapter named `"http"` replaces it.
    #[must_use]
    pub fn register_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Record `name` as known but unusable in this environment.
    #[must_use]
    pub fn register_unavailable_adapter(mut self, name: impl Into<String>) -> Self {
        self.unavailable.push(name.into());
        self
    }

    /// Configure the built-in HTTP adapter.
    #[must_use]
    pub fn http_adapter(mut self, config: HttpAdapterConfig) -> Self {
        self.http = Some(config);
        self
    }

    /// Do not register the built-in HTTP adapter.
    #[must_use]
    pub fn without_http_adapter(mut self) -> Self {
        self.http = None;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns an error if settings could not be applied, the defaults carry
    /// a status validator, or the HTTP adapter fails to initialize.
    pub fn build(self) -> Result<Client, RequestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.defaults.validate_status.is_inherit() {
            return Err(ConfigurationError::invalid(
                "validate_status",
                "status validators are never inherited from instance defaults",
            )
            .into());
        }

        let registry = AdapterRegistry::new();
        if let Some(config) = self.http {
            registry.register(Arc::new(HttpAdapter::new(config)?));
        }
        for name in &self.unavailable {
            registry.register_unavailable(name);
        }
        for adapter in self.adapters {
            registry.register(adapter);
        }

        Ok(Client::from_parts(self.defaults, Arc::new(registry)))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("defaults", &self.defaults)
            .field("http", &self.http)
            .field(
                "adapters",
                &self.adapters.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("unavailable", &self.unavailable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapter::adapter_fn;
    use crate::headers::HeaderBucket;
    use http::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client with a mock `"http"` adapter that echoes the request body.
    fn mock_client(calls: Arc<AtomicUsize>) -> Client {
        Client::builder()
            .without_http_adapter()
            .register_adapter(adapter_fn("http", move |config: RequestConfig| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let data = config.data.get().cloned().unwrap_or_default();
                    Ok(Response::new(StatusCode::OK, data))
                }
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_method_precedence() {
        let client = mock_client(Arc::default());
        let prepared = client.prepare("/a").unwrap();
        assert_eq!(prepared.config().method.get(), Some(&Method::GET));

        client.update_defaults(|defaults| defaults.method = Setting::Set(Method::PUT));
        let prepared = client.prepare("/a").unwrap();
        assert_eq!(prepared.config().method.get(), Some(&Method::PUT));

        let prepared = client
            .prepare(("/a", RequestConfig::new().method_str("delete")))
            .unwrap();
        assert_eq!(prepared.config().method.get(), Some(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_prepare_flattens_headers() {
        let client = mock_client(Arc::default());
        client.update_defaults(|defaults| {
            *defaults = std::mem::take(defaults)
                .header_in(HeaderBucket::Common, "x-a", "1")
                .header_in(HeaderBucket::Post, "x-p", "2");
        });
        let prepared = client.prepare("/a").unwrap();
        let headers = &prepared.config().headers;
        assert!(!headers.has_buckets());
        assert_eq!(headers.values().get("x-a"), Some("1"));
        assert!(!headers.values().contains("x-p"));
    }

    #[tokio::test]
    async fn test_configuration_errors_before_io() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = mock_client(Arc::clone(&calls));

        let err = client
            .request(RequestConfig::new().transitional("silent_json_parsing", "yes"))
            .await
            .unwrap_err();
        match err {
            RequestError::Configuration(e) => assert_eq!(e.option, "transitional.silent_json_parsing"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = client
            .request(RequestConfig::new().header("bad name", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Configuration(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mode_selection() {
        let client = mock_client(Arc::default());
        client
            .interceptors()
            .request
            .register(Interceptor::new(|config| Ok(config)).synchronous(true));
        assert_eq!(client.prepare("/").unwrap().mode(), ExecutionMode::Synchronous);

        client
            .interceptors()
            .request
            .register(Interceptor::new_async(|config| async move { Ok(config) }));
        assert_eq!(client.prepare("/").unwrap().mode(), ExecutionMode::Asynchronous);
    }

    #[tokio::test]
    async fn test_aliases_set_method_and_data() {
        let client = mock_client(Arc::default());
        let response = client
            .post("/items", json!({"a": 1}), RequestConfig::new())
            .await
            .unwrap();
        assert_eq!(response.config.method.get(), Some(&Method::POST));
        assert_eq!(response.config.url.get().map(String::as_str), Some("/items"));
        assert_eq!(response.data, Payload::from(json!({"a": 1})));

        let response = client.delete("/items/1", RequestConfig::new()).await.unwrap();
        assert_eq!(response.config.method.get(), Some(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_form_alias_sets_multipart_content_type() {
        let client = mock_client(Arc::default());
        let response = client
            .put_form("/upload", "raw", RequestConfig::new())
            .await
            .unwrap();
        assert_eq!(
            response.config.headers.values().content_type(),
            Some(MULTIPART_FORM_DATA)
        );
    }

    #[tokio::test]
    async fn test_create_inherits_defaults_not_interceptors() {
        let client = mock_client(Arc::default());
        client.update_defaults(|defaults| defaults.base_url = Setting::Set("https://a.test".into()));
        client
            .interceptors()
            .request
            .register(Interceptor::new(|_| Err(RequestError::custom("parent only"))));

        let child = client.create(RequestConfig::new().timeout(Duration::from_secs(1)));
        let defaults = child.defaults();
        assert_eq!(defaults.base_url.get().map(String::as_str), Some("https://a.test"));
        assert_eq!(defaults.timeout.get(), Some(&Duration::from_secs(1)));
        assert!(child.interceptors().request.is_empty());
        assert!(child.request("/x").await.is_ok());
    }

    #[test]
    fn test_get_uri_merges_defaults() {
        let client = mock_client(Arc::default());
        client.update_defaults(|defaults| defaults.base_url = Setting::Set("https://a.test/v1".into()));
        let rendered = client.get_uri(RequestConfig::new().url("users").param("page", 2));
        assert_eq!(rendered, "https://a.test/v1/users?page=2");
    }

    #[tokio::test]
    async fn test_all_fails_fast() {
        let client = mock_client(Arc::default());
        let results = all([client.request("/a"), client.request("/b")]).await.unwrap();
        assert_eq!(results.len(), 2);

        let ok = client.request(RequestConfig::new().url("/a"));
        let failing = client.request(RequestConfig::new().adapter("nope"));
        let err = all([ok, failing]).await.unwrap_err();
        assert!(matches!(err, RequestError::AdapterResolution(_)));
    }

    #[test]
    fn test_builder_registers_unavailable() {
        let client = Client::builder()
            .without_http_adapter()
            .register_unavailable_adapter("xhr")
            .build()
            .unwrap();
        assert_eq!(client.registry().names(), vec!["xhr".to_owned()]);
        assert!(client.registry().get("xhr").is_none());
    }

    #[test]
    fn test_status_validator_never_becomes_a_default() {
        let err = Client::builder()
            .without_http_adapter()
            .defaults(RequestConfig::new().accept_any_status())
            .build()
            .unwrap_err();
        match err {
            RequestError::Configuration(e) => assert_eq!(e.option, "validate_status"),
            other => panic!("unexpected error: {other:?}"),
        }

        let client = mock_client(Arc::default());
        let child = client.create(RequestConfig::new().validate_status(|s| s.as_u16() < 500));
        assert!(child.defaults().validate_status.is_inherit());

        client.update_defaults(|defaults| defaults.validate_status = Setting::Clear);
        assert!(client.defaults().validate_status.is_inherit());
    }

    #[test]
    fn test_update_defaults_may_read_the_client() {
        let client = mock_client(Arc::default());
        client.update_defaults(|defaults| defaults.base_url = Setting::Set("https://a.test".into()));
        client.update_defaults(|defaults| {
            let current = client.defaults();
            defaults.url = Setting::from_option(current.base_url.into_option().map(|b| b + "/x"));
        });
        assert_eq!(
            client.defaults().url.get().map(String::as_str),
            Some("https://a.test/x")
        );
    }
}
