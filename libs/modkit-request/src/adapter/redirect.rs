//! Redirect policy for the HTTP adapter.
//!
//! The limit comes from the request itself (`max_redirects`, carried as a
//! [`RedirectLimit`] extension), so one pooled client serves requests with
//! different limits. HTTPS → HTTP downgrades are never followed, and
//! credentials are dropped once the chain leaves the original origin.

use http::{Request, Uri, header};
use tower_http::follow_redirect::policy::{Action, Attempt, Policy};

const SENSITIVE_HEADERS: &[header::HeaderName] = &[
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

/// Per-request redirect limit; `0` disables following.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectLimit(pub usize);

#[derive(Debug, Clone, Default)]
pub struct RedirectPolicy {
    /// Read from the first request of a chain
    limit: Option<usize>,
    followed: usize,
    cross_origin: bool,
}

impl RedirectPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn origin(uri: &Uri) -> (&str, &str, u16) {
    // A missing scheme is treated as https so comparisons fail closed
    let scheme = uri.scheme_str().unwrap_or("https");
    let port = uri.port_u16().unwrap_or(match scheme {
        "http" => 80,
        "https" => 443,
        _ => 0,
    });
    (scheme, uri.host().unwrap_or(""), port)
}

impl<B: Clone, E> Policy<B, E> for RedirectPolicy {
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, E> {
        let limit = self.limit.unwrap_or(0);
        if self.followed >= limit {
            tracing::debug!(limit, "redirect limit reached");
            return Ok(Action::Stop);
        }

        let previous = attempt.previous();
        let target = attempt.location();
        if previous.scheme_str() == Some("https") && target.scheme_str() == Some("http") {
            tracing::warn!(%previous, %target, "refusing https to http redirect");
            return Ok(Action::Stop);
        }
        if origin(previous) != origin(target) {
            self.cross_origin = true;
        }

        self.followed += 1;
        Ok(Action::Follow)
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        if self.limit.is_none() {
            self.limit = Some(
                request
                    .extensions()
                    .get::<RedirectLimit>()
                    .map_or(0, |limit| limit.0),
            );
        }
        if self.cross_origin {
            let headers = request.headers_mut();
            for name in SENSITIVE_HEADERS {
                if headers.remove(name).is_some() {
                    tracing::debug!(header = %name, "dropped credential on cross-origin redirect");
                }
            }
        }
    }

    fn clone_body(&self, body: &B) -> Option<B> {
        // 307/308 resend the body
        Some(body.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_origin_defaults_ports() {
        let a: Uri = "https://api.example.com/a".parse().unwrap();
        let b: Uri = "https://api.example.com:443/b".parse().unwrap();
        let c: Uri = "http://api.example.com/c".parse().unwrap();
        assert_eq!(origin(&a), origin(&b));
        assert_ne!(origin(&a), origin(&c));
    }

    #[test]
    fn test_limit_read_from_first_request() {
        let mut policy = RedirectPolicy::new();
        let mut request = Request::builder().uri("https://a.test/").body(()).unwrap();
        request.extensions_mut().insert(RedirectLimit(3));
        <RedirectPolicy as Policy<(), ()>>::on_request(&mut policy, &mut request);
        assert_eq!(policy.limit, Some(3));

        // Later requests in the chain do not reset it
        let mut next = Request::builder().uri("https://a.test/next").body(()).unwrap();
        <RedirectPolicy as Policy<(), ()>>::on_request(&mut policy, &mut next);
        assert_eq!(policy.limit, Some(3));
    }

    #[test]
    fn test_missing_limit_disables_following() {
        let mut policy = RedirectPolicy::new();
        let mut request = Request::builder().uri("https://a.test/").body(()).unwrap();
        <RedirectPolicy as Policy<(), ()>>::on_request(&mut policy, &mut request);
        assert_eq!(policy.limit, Some(0));
    }

    #[test]
    fn test_credentials_dropped_after_cross_origin() {
        let mut policy = RedirectPolicy {
            limit: Some(5),
            followed: 1,
            cross_origin: true,
        };
        let mut request = Request::builder()
            .uri("https://other.test/")
            .header(header::AUTHORIZATION, "Basic abc")
            .header("x-keep", "1")
            .body(())
            .unwrap();
        <RedirectPolicy as Policy<(), ()>>::on_request(&mut policy, &mut request);
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
        assert!(request.headers().get("x-keep").is_some());
    }
}
