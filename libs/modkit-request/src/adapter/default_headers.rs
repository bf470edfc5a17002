use crate::error::RequestError;
use http::header::{HeaderName, HeaderValue, USER_AGENT};
use http::Request;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that fills in headers the request does not already carry.
///
/// Used by the HTTP adapter for `User-Agent`; headers set through the
/// request configuration always win.
#[derive(Clone, Debug, Default)]
pub struct DefaultHeadersLayer {
    defaults: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl DefaultHeadersLayer {
    /// Layer with a single `User-Agent` default.
    ///
    /// # Errors
    /// Returns `RequestError::InvalidHeader` if `user_agent` is not a valid header value.
    pub fn user_agent(user_agent: &str) -> Result<Self, RequestError> {
        Self::from_pairs([(USER_AGENT.as_str(), user_agent)])
    }

    /// Layer from `(name, value)` pairs; later duplicates are ignored.
    fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, RequestError> {
        let mut defaults: Vec<(HeaderName, HeaderValue)> = Vec::new();
        for (name, value) in pairs {
            let name = HeaderName::try_from(name)
                .map_err(|e| RequestError::InvalidHeader(format!("{name:?}: {e}")))?;
            let value = HeaderValue::try_from(value)
                .map_err(|e| RequestError::InvalidHeader(format!("{value:?}: {e}")))?;
            if !defaults.iter().any(|(existing, _)| *existing == name) {
                defaults.push((name, value));
            }
        }
        Ok(Self {
            defaults: Arc::new(defaults),
        })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            defaults: Arc::clone(&self.defaults),
        }
    }
}

/// Service produced by [`DefaultHeadersLayer`].
#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    defaults: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let headers = req.headers_mut();
        for (name, value) in self.defaults.iter() {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method, Response, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    /// Echoes the request headers back so tests can inspect them.
    #[derive(Clone)]
    struct EchoHeaders;

    impl Service<Request<Full<Bytes>>> for EchoHeaders {
        type Response = Response<HeaderMap>;
        type Error = std::convert::Infallible;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let mut response = Response::new(req.headers().clone());
            *response.status_mut() = StatusCode::OK;
            std::future::ready(Ok(response))
        }
    }

    fn request(extra: Option<(&str, &str)>) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(Method::GET).uri("http://example.com");
        if let Some((name, value)) = extra {
            builder = builder.header(name, value);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_added() {
        let layer = DefaultHeadersLayer::from_pairs([
            ("user-agent", "modkit-request/test"),
            ("x-client", "a"),
        ])
        .unwrap();
        let response = layer.layer(EchoHeaders).oneshot(request(None)).await.unwrap();
        let headers = response.into_body();
        assert_eq!(headers.get(USER_AGENT).unwrap(), "modkit-request/test");
        assert_eq!(headers.get("x-client").unwrap(), "a");
    }

    #[tokio::test]
    async fn test_request_headers_not_overwritten() {
        let layer = DefaultHeadersLayer::user_agent("modkit-request/test").unwrap();
        let response = layer
            .layer(EchoHeaders)
            .oneshot(request(Some(("User-Agent", "custom/2.0"))))
            .await
            .unwrap();
        assert_eq!(response.into_body().get(USER_AGENT).unwrap(), "custom/2.0");
    }

    #[test]
    fn test_invalid_value_rejected() {
        let result = DefaultHeadersLayer::user_agent("invalid\x00agent");
        assert!(matches!(result, Err(RequestError::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn test_first_duplicate_kept() {
        let layer = DefaultHeadersLayer::from_pairs([("x-a", "1"), ("X-A", "2")]).unwrap();
        let response = layer.layer(EchoHeaders).oneshot(request(None)).await.unwrap();
        let headers = response.into_body();
        let values: Vec<_> = headers.get_all("x-a").iter().collect();
        assert_eq!(values, vec!["1"]);
    }
}
