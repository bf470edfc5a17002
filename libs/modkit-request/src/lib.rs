#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Request orchestration for `ModKit`
//!
//! A [`Client`] sits in front of pluggable transport adapters and runs every
//! request through the same pipeline:
//!
//! ```text
//! request(target)
//!   → merge with instance defaults → validate options → resolve method
//!   → flatten layered headers → build interceptor chains
//!   → request interceptors (synchronously when all of them allow it)
//!   → dispatch: request transforms → adapter → response transforms
//!   → response interceptors
//! ```
//!
//! The crate provides:
//! - Field-wise configuration merging ([`merge_config`])
//! - Request/response interceptors with tombstoned ejection
//! - Request and response body transform chains
//! - An adapter registry with name lookup and direct adapters
//! - Cooperative cancellation ([`CancelToken`], [`AbortController`])
//! - A hyper/rustls HTTP adapter with decompression, body limits and
//!   redirect handling
//! - `figment`-loadable client defaults ([`ClientSettings`])
//!
//! # Example
//!
//! ```ignore
//! use modkit_request::{Client, Interceptor, RequestConfig};
//!
//! let client = Client::standard()?;
//! client.interceptors().request.register(
//!     Interceptor::new(|config: RequestConfig| Ok(config.header("x-trace-id", "abc")))
//!         .synchronous(true),
//! );
//!
//! let response = client.get("https://example.com/api/users", RequestConfig::new()).await?;
//! let users: Vec<User> = response.json()?;
//! ```

pub mod adapter;
mod cancel;
mod client;
mod config;
mod dispatch;
mod error;
mod headers;
mod interceptor;
mod merge;
mod payload;
mod response;
mod settings;
pub mod transform;
pub mod uri;
pub mod validator;

pub use adapter::{
    Adapter, AdapterChoice, AdapterPreference, AdapterRegistry, DEFAULT_ADAPTERS, HttpAdapter,
    HttpAdapterConfig, adapter_fn,
};
pub use cancel::{
    AbortController, AbortSignal, CancelToken, cancellation_requested,
    throw_if_cancellation_requested,
};
pub use client::{Client, ClientBuilder, ExecutionMode, PendingRequest, RequestTarget, all};
pub use config::{
    BasicAuth, DEFAULT_ACCEPT, DEFAULT_MAX_REDIRECTS, ParamEncoder, ParamSerializer,
    ParamsSerializerOptions, RequestConfig, ResponseType, Setting, StatusValidator,
    TransitionalOptions,
};
pub use dispatch::dispatch_request;
pub use error::{
    AdapterAttempt, AdapterResolutionError, BoxError, CanceledError, ConfigurationError,
    ConfigurationErrorKind, RequestError, TransportError, TransportErrorKind, is_cancel,
};
pub use headers::{HeaderBucket, HeaderConfig, Headers};
pub use interceptor::{
    AsyncHandlerFn, Handler, Interceptor, InterceptorId, InterceptorManager, Interceptors,
    RunWhen, SyncHandlerFn,
};
pub use merge::{merge_config, merge_optional};
pub use payload::Payload;
pub use response::{Response, ResponseBody};
pub use settings::{AuthSettings, ClientSettings, HeaderSetting};
pub use transform::{Transform, TransformContext};
