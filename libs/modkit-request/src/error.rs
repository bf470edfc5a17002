use crate::config::RequestConfig;
use crate::response::Response;
use std::fmt;
use thiserror::Error;

/// Boxed error type used for transport and user-supplied failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of configuration validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationErrorKind {
    /// Option name is not declared in the schema and unknown options are rejected
    UnknownOption,
    /// Option value does not satisfy its validator
    InvalidValue,
}

/// An option failed validation before the request was dispatched.
///
/// `option` is the dotted path of the offending option, e.g.
/// `transitional.silent_json_parsing`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid option `{option}`: {reason}")]
pub struct ConfigurationError {
    pub option: String,
    pub kind: ConfigurationErrorKind,
    pub reason: String,
}

impl ConfigurationError {
    pub(crate) fn invalid(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            kind: ConfigurationErrorKind::InvalidValue,
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(option: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            kind: ConfigurationErrorKind::UnknownOption,
            reason: "unknown option".to_owned(),
        }
    }
}

/// The request was canceled through its `CancelToken` or `AbortSignal`.
///
/// Carries the cancellation message (if one was supplied) and the
/// configuration of the request that observed the cancellation.
#[derive(Error, Debug, Clone)]
#[error("{}", .message.as_deref().unwrap_or("canceled"))]
pub struct CanceledError {
    pub message: Option<String>,
    pub config: Option<Box<RequestConfig>>,
}

impl CanceledError {
    #[must_use]
    pub fn new(message: Option<String>, config: Option<RequestConfig>) -> Self {
        Self {
            message,
            config: config.map(Box::new),
        }
    }
}

/// One failed step of adapter resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AdapterAttempt {
    /// A name was given but nothing is registered under it
    NotRegistered(String),
    /// The name is known but the adapter is not usable in this environment
    Unavailable(String),
    /// No adapter name or value was supplied at all
    Missing,
}

impl fmt::Display for AdapterAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterAttempt::NotRegistered(name) => write!(f, "adapter '{name}' is not registered"),
            AdapterAttempt::Unavailable(name) => {
                write!(f, "adapter '{name}' is not available in this environment")
            }
            AdapterAttempt::Missing => f.write_str("no adapter was specified"),
        }
    }
}

/// No element of the adapter preference resolved to a usable adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no usable adapter: {}", describe_attempts(.attempts))]
pub struct AdapterResolutionError {
    pub attempts: Vec<AdapterAttempt>,
}

impl AdapterResolutionError {
    /// Names that were looked up and did not resolve.
    #[must_use]
    pub fn attempted_names(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter_map(|attempt| match attempt {
                AdapterAttempt::NotRegistered(name) | AdapterAttempt::Unavailable(name) => {
                    Some(name.as_str())
                }
                AdapterAttempt::Missing => None,
            })
            .collect()
    }
}

fn describe_attempts(attempts: &[AdapterAttempt]) -> String {
    if attempts.is_empty() {
        return AdapterAttempt::Missing.to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportErrorKind {
    /// Connection-level failure (DNS, refused, reset, TLS handshake)
    Network,
    /// The adapter's own timeout fired and `clarify_timeout_error` is set
    TimedOut,
    /// The adapter's own timeout fired (legacy classification)
    ConnectionAborted,
    /// The server answered with a 4xx status rejected by `validate_status`
    BadRequest,
    /// The server answered with a status rejected by `validate_status`,
    /// or the response could not be read
    BadResponse,
    /// Response body exceeded `max_content_length`
    BodyTooLarge,
    /// The final URL could not be used by the transport
    InvalidUrl,
    /// Anything else reported by an adapter
    Other,
}

/// Failure reported by a transport adapter.
///
/// When the server was reached, `response` holds the response. The
/// dispatcher runs the response transform chain over it before the error
/// reaches the caller, so error consumers see the same data shape as
/// success consumers.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
    pub response: Option<Box<Response>>,
}

impl TransportError {
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            response: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(Box::new(response));
        self
    }
}

/// Request pipeline error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RequestError {
    /// Invalid option shape caught before any I/O
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Cancellation observed at a checkpoint or by the adapter
    #[error(transparent)]
    Canceled(#[from] CanceledError),

    /// The adapter preference did not resolve to a usable adapter
    #[error(transparent)]
    AdapterResolution(#[from] AdapterResolutionError),

    /// Failure reported by the transport adapter
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A request or response transform failed
    #[error("transform failed: {0}")]
    Transform(#[source] BoxError),

    /// Header name or value could not be represented
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Error raised by an interceptor or other user code
    #[error("{0}")]
    Custom(#[source] BoxError),
}

impl RequestError {
    /// Wrap an arbitrary error raised from user code (interceptors, adapters).
    pub fn custom(err: impl Into<BoxError>) -> Self {
        RequestError::Custom(err.into())
    }

    /// Wrap a failure raised from a transform function.
    pub fn transform(err: impl Into<BoxError>) -> Self {
        RequestError::Transform(err.into())
    }

    /// True when the error represents a user-initiated cancellation.
    #[must_use]
    pub fn is_cancel(&self) -> bool {
        matches!(self, RequestError::Canceled(_))
    }

    /// Response attached to a transport failure, if the server was reached.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            RequestError::Transport(err) => err.response.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn response_mut(&mut self) -> Option<&mut Response> {
        match self {
            RequestError::Transport(err) => err.response.as_deref_mut(),
            _ => None,
        }
    }
}

/// Returns `true` if `err` is a cancellation rather than a transport or
/// configuration failure.
#[must_use]
pub fn is_cancel(err: &RequestError) -> bool {
    err.is_cancel()
}
