//! Request and response interceptors.
//!
//! An interceptor is a pair of handlers: `fulfilled` transforms the value
//! flowing through the chain, `rejected` handles the failure of the step
//! before it and may recover. Handlers are synchronous closures or closures
//! returning a boxed future.
//!
//! Registrations live in an append-only arena. Ejecting leaves a tombstone,
//! so ids stay valid and are never reused, and every request works on a
//! snapshot taken when it is prepared.

use crate::config::RequestConfig;
use crate::error::RequestError;
use crate::response::Response;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type SyncHandlerFn<I, O> = Arc<dyn Fn(I) -> Result<O, RequestError> + Send + Sync>;
pub type AsyncHandlerFn<I, O> =
    Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, RequestError>> + Send + Sync>;
pub type RunWhen = Arc<dyn Fn(&RequestConfig) -> bool + Send + Sync>;

/// A handler callable either synchronously or as a future.
pub enum Handler<I, O> {
    Sync(SyncHandlerFn<I, O>),
    Async(AsyncHandlerFn<I, O>),
}

impl<I, O> Handler<I, O> {
    #[must_use]
    pub fn is_sync(&self) -> bool {
        matches!(self, Handler::Sync(_))
    }

    /// Invoke the handler, awaiting it if asynchronous.
    ///
    /// # Errors
    /// Returns whatever error the handler produces.
    pub async fn call(&self, input: I) -> Result<O, RequestError> {
        match self {
            Handler::Sync(f) => f(input),
            Handler::Async(f) => f(input).await,
        }
    }
}

impl<I, O> Clone for Handler<I, O> {
    fn clone(&self) -> Self {
        match self {
            Handler::Sync(f) => Handler::Sync(Arc::clone(f)),
            Handler::Async(f) => Handler::Async(Arc::clone(f)),
        }
    }
}

impl<I, O> fmt::Debug for Handler<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync(..)"),
            Handler::Async(_) => f.write_str("Handler::Async(..)"),
        }
    }
}

/// Sync handlers of an interceptor that can run in synchronous mode.
pub(crate) type SyncPair<T> = (SyncHandlerFn<T, T>, Option<SyncHandlerFn<RequestError, T>>);

/// One registered interceptor.
///
/// ```ignore
/// client.interceptors().request.register(
///     Interceptor::new(|config: RequestConfig| Ok(config.header("x-trace", "1")))
///         .synchronous(true)
///         .run_when(|config| config.method.get() == Some(&Method::POST)),
/// );
/// ```
pub struct Interceptor<T> {
    fulfilled: Handler<T, T>,
    rejected: Option<Handler<RequestError, T>>,
    synchronous: bool,
    run_when: Option<RunWhen>,
}

impl<T: Send + 'static> Interceptor<T> {
    pub fn new(f: impl Fn(T) -> Result<T, RequestError> + Send + Sync + 'static) -> Self {
        Self::from_handler(Handler::Sync(Arc::new(f)))
    }

    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestError>> + Send + 'static,
    {
        Self::from_handler(Handler::Async(Arc::new(move |value| f(value).boxed())))
    }

    #[must_use]
    pub fn from_handler(fulfilled: Handler<T, T>) -> Self {
        Self {
            fulfilled,
            rejected: None,
            synchronous: false,
            run_when: None,
        }
    }

    #[must_use]
    pub fn on_rejected(
        mut self,
        f: impl Fn(RequestError) -> Result<T, RequestError> + Send + Sync + 'static,
    ) -> Self {
        self.rejected = Some(Handler::Sync(Arc::new(f)));
        self
    }

    #[must_use]
    pub fn on_rejected_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestError>> + Send + 'static,
    {
        self.rejected = Some(Handler::Async(Arc::new(move |err| f(err).boxed())));
        self
    }

    /// Ask for synchronous execution. Only honored when every handler is
    /// `Handler::Sync`.
    #[must_use]
    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Only include this interceptor for requests matching `predicate`.
    #[must_use]
    pub fn run_when(
        mut self,
        predicate: impl Fn(&RequestConfig) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.run_when = Some(Arc::new(predicate));
        self
    }
}

impl<T> Interceptor<T> {
    #[must_use]
    pub fn fulfilled(&self) -> &Handler<T, T> {
        &self.fulfilled
    }

    #[must_use]
    pub fn rejected(&self) -> Option<&Handler<RequestError, T>> {
        self.rejected.as_ref()
    }

    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        self.sync_pair().is_some()
    }

    /// Whether this interceptor takes part in a request with `config`.
    #[must_use]
    pub fn applies_to(&self, config: &RequestConfig) -> bool {
        self.run_when.as_ref().is_none_or(|predicate| predicate(config))
    }

    pub(crate) fn sync_pair(&self) -> Option<SyncPair<T>> {
        if !self.synchronous {
            return None;
        }
        let Handler::Sync(fulfilled) = &self.fulfilled else {
            return None;
        };
        let rejected = match &self.rejected {
            None => None,
            Some(Handler::Sync(f)) => Some(Arc::clone(f)),
            Some(Handler::Async(_)) => return None,
        };
        Some((Arc::clone(fulfilled), rejected))
    }
}

impl<T> fmt::Debug for Interceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("fulfilled", &self.fulfilled)
            .field("rejected", &self.rejected)
            .field("synchronous", &self.synchronous)
            .field("run_when", &self.run_when.is_some())
            .finish()
    }
}

/// Handle returned by [`InterceptorManager::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(usize);

/// Ordered interceptor registry for one side of the pipeline.
pub struct InterceptorManager<T> {
    slots: RwLock<Vec<Option<Arc<Interceptor<T>>>>>,
}

impl<T> Default for InterceptorManager<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }
}

impl<T> InterceptorManager<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; its position is its registration order.
    pub fn register(&self, interceptor: Interceptor<T>) -> InterceptorId {
        let mut slots = self.slots.write();
        slots.push(Some(Arc::new(interceptor)));
        let id = InterceptorId(slots.len() - 1);
        tracing::trace!(id = id.0, "interceptor registered");
        id
    }

    /// Remove a registration. Returns `false` if `id` was already ejected.
    pub fn eject(&self, id: InterceptorId) -> bool {
        let removed = self
            .slots
            .write()
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some();
        if removed {
            tracing::trace!(id = id.0, "interceptor ejected");
        }
        removed
    }

    /// Eject every registration.
    pub fn clear(&self) {
        for slot in self.slots.write().iter_mut() {
            *slot = None;
        }
    }

    /// Visit live interceptors in registration order.
    pub fn for_each(&self, mut visit: impl FnMut(&Arc<Interceptor<T>>)) {
        for interceptor in self.snapshot() {
            visit(&interceptor);
        }
    }

    /// Live interceptors in registration order, detached from the registry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Interceptor<T>>> {
        self.slots.read().iter().flatten().cloned().collect()
    }

    /// Number of live interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for InterceptorManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorManager")
            .field("live", &self.len())
            .finish()
    }
}

/// Request-side and response-side registries of one client.
#[derive(Debug, Default)]
pub struct Interceptors {
    pub request: InterceptorManager<RequestConfig>,
    pub response: InterceptorManager<Response>,
}

/// Thread `state` through `chain` with `.then(fulfilled, rejected)`
/// semantics: a rejected handler sees the failure of the step before it.
pub(crate) async fn run_chain<T>(
    chain: &[Arc<Interceptor<T>>],
    mut state: Result<T, RequestError>,
) -> Result<T, RequestError> {
    for interceptor in chain {
        state = match state {
            Ok(value) => interceptor.fulfilled.call(value).await,
            Err(err) => match &interceptor.rejected {
                Some(rejected) => rejected.call(err).await,
                None => Err(err),
            },
        };
    }
    state
}

/// Run synchronous request interceptors in order.
///
/// A failing step hands its error to its own rejected handler and ends the
/// chain: `Ok` recovers with that value, `Err` (or no handler) rejects.
pub(crate) fn run_sync_chain<T>(chain: &[SyncPair<T>], mut value: T) -> Result<T, RequestError> {
    for (fulfilled, rejected) in chain {
        match fulfilled(value) {
            Ok(next) => value = next,
            Err(err) => {
                return match rejected {
                    Some(rejected) => rejected(err),
                    None => Err(err),
                };
            }
        }
    }
    Ok(value)
}
