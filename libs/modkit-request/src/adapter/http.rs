//! HTTP(S) transport adapter, registered as `"http"`.
//!
//! Built on hyper-util's pooled client with a rustls connector. The tower
//! stack, outer to inner:
//!
//! ```text
//! DefaultHeaders (User-Agent) → Decompression → FollowRedirect → hyper client
//! ```
//!
//! Timeouts, body limits, cancellation and status validation are applied
//! per request from the resolved configuration.

use super::default_headers::DefaultHeadersLayer;
use super::redirect::{RedirectLimit, RedirectPolicy};
use super::tls::{self, TlsRootConfig, TransportSecurity};
use super::Adapter;
use crate::cancel;
use crate::config::{DEFAULT_MAX_REDIRECTS, RequestConfig, ResponseType, Setting};
use crate::error::{BoxError, CanceledError, RequestError, TransportError, TransportErrorKind};
use crate::headers::Headers;
use crate::payload::Payload;
use crate::response::{Response, ResponseBody, read_body_limited};
use crate::uri;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;
use tower_http::follow_redirect::FollowRedirectLayer;

/// Default User-Agent header value
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-request/", env!("CARGO_PKG_VERSION"));

/// Body limit applied when a request sets no `max_content_length` (10 MiB)
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

type HttpService =
    BoxCloneSyncService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, BoxError>;

/// Construction-time settings of an [`HttpAdapter`].
#[derive(Debug, Clone)]
pub struct HttpAdapterConfig {
    /// `User-Agent` sent when the request sets none
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate source (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Body limit when the request sets no `max_content_length`
    pub max_content_length: usize,

    /// Idle pooled connections are closed after this long (`None`: hyper default)
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum idle connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpAdapterConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::WebPki,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpAdapterConfig {
    /// Preset for local mock servers: plain HTTP allowed.
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn for_testing() -> Self {
        Self::default().allow_insecure_http()
    }

    /// Allow plain `http://` URLs.
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "modkit_request::security",
            "allow_insecure_http() called - HTTP traffic will NOT be encrypted"
        );
        self.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.tls_roots = roots;
        self
    }

    #[must_use]
    pub fn max_content_length(mut self, limit: usize) -> Self {
        self.max_content_length = limit;
        self
    }
}

/// Metadata of the request an [`HttpAdapter`] actually sent, exposed as
/// `Response::request`.
#[derive(Debug, Clone)]
pub struct HttpRequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

/// hyper/rustls transport adapter.
#[derive(Clone)]
pub struct HttpAdapter {
    service: HttpService,
    transport: TransportSecurity,
    max_content_length: usize,
}

impl HttpAdapter {
    /// Build the adapter and its connection pool.
    ///
    /// # Errors
    /// Fails if TLS cannot be configured or the user agent is not a valid
    /// header value.
    pub fn new(config: HttpAdapterConfig) -> Result<Self, RequestError> {
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let https = tls::build_https_connector(config.tls_roots, config.transport)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_idle_timeout needs a timer
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(idle) = config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        let service = ServiceBuilder::new()
            .layer(DefaultHeadersLayer::user_agent(&config.user_agent)?)
            .layer(DecompressionLayer::new())
            .layer(FollowRedirectLayer::with_policy(RedirectPolicy::new()))
            .service(hyper_client)
            .map_response(box_response_body)
            .map_err(BoxError::from);

        Ok(Self {
            service: BoxCloneSyncService::new(service),
            transport: config.transport,
            max_content_length: config.max_content_length,
        })
    }

    fn build_request(
        &self,
        config: &RequestConfig,
    ) -> Result<http::Request<Full<Bytes>>, RequestError> {
        let method = config.method.get().cloned().unwrap_or(Method::GET);
        let full_path = uri::build_full_path(
            config.base_url.get().map(String::as_str),
            config.url.get().map_or("", String::as_str),
        );
        let url = uri::build_url(&full_path, config.params.get(), config.params_serializer.get());
        let target = self.validate_url(&url)?;

        let mut headers = config.headers.values().clone().into_map();
        if let Some(auth) = config.auth.get() {
            let encoded = BASE64.encode(format!("{}:{}", auth.username, auth.password));
            let value = HeaderValue::try_from(format!("Basic {encoded}"))
                .map_err(|e| RequestError::InvalidHeader(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let body = config
            .data
            .get()
            .map(|data| data.encode(content_type))
            .transpose()?
            .unwrap_or_default();

        let mut request = http::Request::builder()
            .method(method)
            .uri(target)
            .body(Full::new(body))
            .map_err(|e| {
                TransportError::new(TransportErrorKind::InvalidUrl, format!("invalid request: {e}"))
                    .with_source(e)
            })?;
        *request.headers_mut() = headers;
        let limit = match config.max_redirects {
            Setting::Set(limit) => limit,
            Setting::Clear => 0,
            Setting::Inherit => DEFAULT_MAX_REDIRECTS,
        };
        request.extensions_mut().insert(RedirectLimit(limit));
        Ok(request)
    }

    fn validate_url(&self, url: &str) -> Result<Uri, TransportError> {
        let invalid = |reason: String| {
            TransportError::new(TransportErrorKind::InvalidUrl, format!("invalid URL '{url}': {reason}"))
        };
        let target: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;
        match target.scheme_str() {
            Some("https") => {}
            Some("http") if self.transport == TransportSecurity::AllowInsecureHttp => {}
            Some("http") => return Err(invalid("plain http is not allowed".to_owned())),
            Some(other) => return Err(invalid(format!("unsupported scheme '{other}'"))),
            None => return Err(invalid("URL must be absolute".to_owned())),
        }
        if target.host().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_owned()));
        }
        Ok(target)
    }

    async fn exchange(
        &self,
        config: &RequestConfig,
        request: http::Request<Full<Bytes>>,
    ) -> Result<Response, RequestError> {
        let info = HttpRequestInfo {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        };

        let response = self
            .service
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| {
                TransportError::new(TransportErrorKind::Network, format!("network error: {e}"))
                    .with_source(e)
            })?;

        let (parts, body) = response.into_parts();
        let limit = config
            .max_content_length
            .get()
            .copied()
            .unwrap_or(self.max_content_length);
        let bytes = read_body_limited(body, limit).await?;
        let data = match config.response_type.get() {
            Some(ResponseType::Bytes) => Payload::Bytes(bytes),
            _ => Payload::Text(String::from_utf8_lossy(&bytes).into_owned()),
        };

        tracing::debug!(
            method = %info.method,
            uri = %info.uri,
            status = parts.status.as_u16(),
            "http exchange completed"
        );

        let mut response = Response::new(parts.status, data)
            .with_headers(Headers::from(parts.headers))
            .with_request(Arc::new(info));
        response.config = config.clone();
        settle(response)
    }
}

impl std::fmt::Debug for HttpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAdapter")
            .field("transport", &self.transport)
            .field("max_content_length", &self.max_content_length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, config: &RequestConfig) -> Result<Response, RequestError> {
        let request = self.build_request(config)?;

        let exchange = async {
            match config.timeout.get() {
                Some(timeout) if !timeout.is_zero() => {
                    match tokio::time::timeout(*timeout, self.exchange(config, request)).await {
                        Ok(result) => result,
                        Err(_) => Err(timeout_error(config, *timeout)),
                    }
                }
                _ => self.exchange(config, request).await,
            }
        };

        tokio::select! {
            biased;
            () = cancel::cancellation_requested(config) => {
                let err = cancel::throw_if_cancellation_requested(config)
                    .err()
                    .unwrap_or_else(|| CanceledError::new(None, Some(config.clone())));
                Err(err.into())
            }
            result = exchange => result,
        }
    }
}

fn timeout_error(config: &RequestConfig, timeout: Duration) -> RequestError {
    let kind = if config.transitional.clarify_timeout_error() {
        TransportErrorKind::TimedOut
    } else {
        TransportErrorKind::ConnectionAborted
    };
    let message = config.timeout_error_message.get().cloned().unwrap_or_else(|| {
        format!("timeout of {}ms exceeded", timeout.as_millis())
    });
    TransportError::new(kind, message).into()
}

/// Reject statuses the configuration does not accept. `Inherit` means 2xx,
/// `Clear` accepts everything.
fn settle(response: Response) -> Result<Response, RequestError> {
    let accepted = match &response.config.validate_status {
        Setting::Inherit => response.status.is_success(),
        Setting::Clear => true,
        Setting::Set(validator) => validator.check(response.status),
    };
    if accepted {
        return Ok(response);
    }
    let kind = if response.status.is_client_error() {
        TransportErrorKind::BadRequest
    } else {
        TransportErrorKind::BadResponse
    };
    let message = format!("Request failed with status code {}", response.status.as_u16());
    Err(TransportError::new(kind, message).with_response(response).into())
}

/// Box the (possibly decompressed) body into [`ResponseBody`].
fn box_response_body<B>(response: http::Response<B>) -> http::Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    http::Response::from_parts(parts, body.map_err(Into::into).boxed())
}
