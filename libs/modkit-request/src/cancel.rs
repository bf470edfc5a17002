//! Cooperative cancellation.
//!
//! Two sources feed the same semantics: an explicit [`CancelToken`] (with a
//! message and an awaitable form) and a generic [`AbortSignal`] (a boolean
//! "aborted" flag tripped through an [`AbortController`]). Both transition
//! once to "requested" and never revert. Clones share state, so the caller,
//! the dispatcher and the adapter all observe the same token.
//!
//! The pipeline consults [`throw_if_cancellation_requested`] at fixed
//! checkpoints; adapters race their I/O against [`cancellation_requested`].

use crate::config::RequestConfig;
use crate::error::CanceledError;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One-shot trip shared by both cancellation sources.
#[derive(Debug, Default)]
struct Trip {
    token: CancellationToken,
    reason: OnceLock<Option<String>>,
}

impl Trip {
    /// Returns `true` if this call performed the transition.
    fn fire(&self, reason: Option<String>) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            self.token.cancel();
        }
        first
    }

    fn is_fired(&self) -> bool {
        self.reason.get().is_some()
    }

    fn reason(&self) -> Option<&str> {
        self.reason.get().and_then(Option::as_deref)
    }
}

/// Explicit cancellation token.
///
/// ```ignore
/// let token = CancelToken::new();
/// let pending = client.request(("/slow", RequestConfig::new().cancel_token(token.clone())));
/// token.cancel(Some("navigated away"));
/// assert!(pending.await.unwrap_err().is_cancel());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    trip: Arc<Trip>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Only the first call has an effect; returns
    /// whether this call was the one that tripped the token.
    pub fn cancel(&self, message: Option<&str>) -> bool {
        let fired = self.trip.fire(message.map(str::to_owned));
        if fired {
            tracing::debug!(message = message.unwrap_or("canceled"), "cancellation requested");
        }
        fired
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.trip.is_fired()
    }

    /// Message supplied to [`CancelToken::cancel`], if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.trip.reason()
    }

    /// Fail with `CanceledError` if cancellation was requested.
    ///
    /// # Errors
    /// Returns `CanceledError` carrying the cancellation message.
    pub fn throw_if_requested(&self) -> Result<(), CanceledError> {
        if self.is_requested() {
            return Err(CanceledError::new(self.reason().map(str::to_owned), None));
        }
        Ok(())
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.trip.token.cancelled().await;
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.trip, &other.trip)
    }
}

/// Read side of an [`AbortController`].
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    trip: Arc<Trip>,
}

impl AbortSignal {
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.trip.is_fired()
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.trip.reason()
    }

    /// Completes once the signal has been aborted.
    pub async fn aborted(&self) {
        self.trip.token.cancelled().await;
    }

    /// A signal that aborts itself after `duration`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        let controller = AbortController::new();
        let signal = controller.signal();
        let watched = signal.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(duration) => {
                    controller.abort_with(format!("signal timed out after {duration:?}"));
                }
                () = watched.aborted() => {}
            }
        });
        signal
    }

    /// Wrap a `tokio_util` token so that cancelling it aborts the signal.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        let controller = AbortController::new();
        let signal = controller.signal();
        let watched = signal.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => controller.abort(),
                () = watched.aborted() => {}
            }
        });
        signal
    }
}

impl PartialEq for AbortSignal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.trip, &other.trip)
    }
}

/// Write side of an [`AbortSignal`].
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn abort(&self) {
        self.signal.trip.fire(None);
    }

    pub fn abort_with(&self, reason: impl Into<String>) {
        self.signal.trip.fire(Some(reason.into()));
    }
}

/// Cancellation checkpoint: fail if either source on `config` was tripped.
///
/// # Errors
/// Returns `CanceledError` carrying the token message and a copy of `config`.
pub fn throw_if_cancellation_requested(config: &RequestConfig) -> Result<(), CanceledError> {
    if let Some(token) = config.cancel_token.get()
        && token.is_requested()
    {
        return Err(CanceledError::new(
            token.reason().map(str::to_owned),
            Some(config.clone()),
        ));
    }
    if let Some(signal) = config.signal.get()
        && signal.is_aborted()
    {
        return Err(CanceledError::new(
            signal.reason().map(str::to_owned),
            Some(config.clone()),
        ));
    }
    Ok(())
}

/// Completes when either cancellation source on `config` is tripped; never
/// completes if the configuration carries none.
pub async fn cancellation_requested(config: &RequestConfig) {
    match (config.cancel_token.get(), config.signal.get()) {
        (Some(token), Some(signal)) => {
            tokio::select! {
                () = token.cancelled() => {}
                () = signal.aborted() => {}
            }
        }
        (Some(token), None) => token.cancelled().await,
        (None, Some(signal)) => signal.aborted().await,
        (None, None) => std::future::pending::<()>().await,
    }
}
