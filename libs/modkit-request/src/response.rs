use crate::config::RequestConfig;
use crate::error::{BoxError, RequestError, TransportError, TransportErrorKind};
use crate::headers::Headers;
use crate::payload::Payload;
use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type alias for the boxed body produced by the HTTP adapter's tower stack.
///
/// Holds either the raw body or a decompressed one (gzip/br/deflate).
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

/// Settled response of one request.
///
/// Adapters fill in `data` with the raw body; the response transform chain
/// may replace it (e.g. parse JSON). `config` is the resolved configuration
/// the request was dispatched with.
#[derive(Clone)]
pub struct Response {
    pub data: Payload,
    pub status: StatusCode,
    pub status_text: String,
    pub headers: Headers,
    pub config: RequestConfig,
    /// Transport-specific handle to the underlying request, if the adapter exposes one
    pub request: Option<Arc<dyn Any + Send + Sync>>,
}

impl Response {
    /// Response with the canonical reason phrase as status text and no headers.
    #[must_use]
    pub fn new(status: StatusCode, data: impl Into<Payload>) -> Self {
        Self {
            data: data.into(),
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: Headers::new(),
            config: RequestConfig::default(),
            request: None,
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: Arc<dyn Any + Send + Sync>) -> Self {
        self.request = Some(request);
        self
    }

    /// Deserialize `data` into `T`.
    ///
    /// # Errors
    /// Returns `RequestError::Transform` if the body does not deserialize.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        self.data.deserialize()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("data", &self.data)
            .field("request", &self.request.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}

/// Read a response body, failing once more than `limit` bytes arrive.
///
/// The limit applies to decompressed data, so a small compressed payload
/// cannot expand past it.
pub(crate) async fn read_body_limited(
    body: ResponseBody,
    limit: usize,
) -> Result<Bytes, TransportError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| {
            TransportError::new(TransportErrorKind::Network, "failed to read response body")
                .with_source(e)
        })?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(TransportError::new(
                    TransportErrorKind::BodyTooLarge,
                    format!(
                        "max content length of {limit} bytes exceeded ({} bytes read)",
                        collected.len() + chunk.len()
                    ),
                ));
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
