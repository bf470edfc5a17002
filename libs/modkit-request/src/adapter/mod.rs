//! Transport adapters and their registry.
//!
//! An adapter performs the I/O for one resolved configuration. The pipeline
//! only sees the [`Adapter`] trait; concrete transports are looked up by
//! name in an [`AdapterRegistry`] or passed directly in the configuration.
//!
//! A name may be registered as *unavailable*: known, but not usable in this
//! build or environment. Resolution reports those separately from names
//! nothing was ever registered under.

mod default_headers;
pub mod http;
mod redirect;
pub mod tls;

use crate::config::RequestConfig;
use crate::error::{AdapterAttempt, AdapterResolutionError, RequestError};
use crate::response::Response;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub use self::default_headers::DefaultHeadersLayer;
pub use self::http::{HttpAdapter, HttpAdapterConfig, HttpRequestInfo};
pub use self::redirect::RedirectLimit;
pub use self::tls::{TlsRootConfig, TransportSecurity};

/// Adapter preference used when a configuration names none.
pub const DEFAULT_ADAPTERS: &[&str] = &["http"];

/// Performs the transport I/O of one request.
///
/// Implementations must settle exactly once and should stop early when the
/// configuration's `cancel_token` or `signal` is tripped
/// (see [`crate::cancel::cancellation_requested`]).
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry name, lowercase.
    fn name(&self) -> &str;

    /// Send the request described by `config`.
    ///
    /// # Errors
    /// Transport failures, rejected statuses (carrying the response) and
    /// cancellation.
    async fn send(&self, config: &RequestConfig) -> Result<Response, RequestError>;
}

type AdapterFn =
    dyn Fn(RequestConfig) -> BoxFuture<'static, Result<Response, RequestError>> + Send + Sync;

struct FnAdapter {
    name: String,
    f: Box<AdapterFn>,
}

#[async_trait]
impl Adapter for FnAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, config: &RequestConfig) -> Result<Response, RequestError> {
        (self.f)(config.clone()).await
    }
}

/// Wrap a closure as an adapter. The closure receives an owned copy of the
/// resolved configuration.
///
/// ```ignore
/// let echo = adapter_fn("echo", |config| async move {
///     Ok(Response::new(StatusCode::OK, config.data.into_option().unwrap_or_default()))
/// });
/// ```
pub fn adapter_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Adapter>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, RequestError>> + Send + 'static,
{
    Arc::new(FnAdapter {
        name: name.into().to_ascii_lowercase(),
        f: Box::new(move |config| f(config).boxed()),
    })
}

/// One element of an adapter preference.
#[derive(Clone)]
pub enum AdapterChoice {
    Named(String),
    Direct(Arc<dyn Adapter>),
}

impl fmt::Debug for AdapterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterChoice::Named(name) => f.debug_tuple("Named").field(name).finish(),
            AdapterChoice::Direct(adapter) => f.debug_tuple("Direct").field(&adapter.name()).finish(),
        }
    }
}

impl PartialEq for AdapterChoice {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AdapterChoice::Named(a), AdapterChoice::Named(b)) => a.eq_ignore_ascii_case(b),
            (AdapterChoice::Direct(a), AdapterChoice::Direct(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Ordered adapter preference; the first element that resolves wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterPreference(pub Vec<AdapterChoice>);

impl AdapterPreference {
    /// Preference made of names only.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            names
                .into_iter()
                .map(|name| AdapterChoice::Named(name.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for AdapterPreference {
    fn from(name: &str) -> Self {
        Self::names([name])
    }
}

impl From<String> for AdapterPreference {
    fn from(name: String) -> Self {
        Self::names([name])
    }
}

impl From<Vec<&str>> for AdapterPreference {
    fn from(names: Vec<&str>) -> Self {
        Self::names(names)
    }
}

impl From<Arc<dyn Adapter>> for AdapterPreference {
    fn from(adapter: Arc<dyn Adapter>) -> Self {
        Self(vec![AdapterChoice::Direct(adapter)])
    }
}

impl From<Vec<AdapterChoice>> for AdapterPreference {
    fn from(choices: Vec<AdapterChoice>) -> Self {
        Self(choices)
    }
}

/// Name → adapter lookup shared by a client and every client created from it.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Option<Arc<dyn Adapter>>>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under its own name, replacing any previous entry.
    pub fn register(&self, adapter: Arc<dyn Adapter>) {
        let name = adapter.name().to_ascii_lowercase();
        tracing::debug!(adapter = %name, "adapter registered");
        self.adapters.write().insert(name, Some(adapter));
    }

    /// Record `name` as known but unusable.
    pub fn register_unavailable(&self, name: &str) {
        self.adapters
            .write()
            .insert(name.to_ascii_lowercase(), None);
    }

    /// Forget `name`. Returns `true` if it was known.
    pub fn unregister(&self, name: &str) -> bool {
        self.adapters
            .write()
            .remove(&name.to_ascii_lowercase())
            .is_some()
    }

    /// Usable adapter registered under `name` (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
            .flatten()
    }

    /// Known names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Pick the first usable adapter of `preference`. Never invokes it.
    ///
    /// # Errors
    /// Returns `AdapterResolutionError` listing every failed attempt; an
    /// empty preference reports `AdapterAttempt::Missing`.
    pub fn resolve(
        &self,
        preference: &AdapterPreference,
    ) -> Result<Arc<dyn Adapter>, AdapterResolutionError> {
        if preference.is_empty() {
            return Err(AdapterResolutionError {
                attempts: vec![AdapterAttempt::Missing],
            });
        }

        let adapters = self.adapters.read();
        let mut attempts = Vec::with_capacity(preference.0.len());
        for choice in &preference.0 {
            match choice {
                AdapterChoice::Direct(adapter) => return Ok(Arc::clone(adapter)),
                AdapterChoice::Named(name) => {
                    let key = name.to_ascii_lowercase();
                    match adapters.get(&key) {
                        Some(Some(adapter)) => return Ok(Arc::clone(adapter)),
                        Some(None) => attempts.push(AdapterAttempt::Unavailable(name.clone())),
                        None => attempts.push(AdapterAttempt::NotRegistered(name.clone())),
                    }
                }
            }
        }
        Err(AdapterResolutionError { attempts })
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("names", &self.names())
            .finish()
    }
}
