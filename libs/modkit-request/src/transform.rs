//! Body transform chains.
//!
//! A chain is an ordered list of synchronous functions applied to the body
//! before it reaches the adapter (`transform_request`) and after the adapter
//! settles (`transform_response`). Each function sees the resolved
//! configuration and may edit the outgoing headers.

use crate::config::{RequestConfig, ResponseType};
use crate::error::RequestError;
use crate::headers::Headers;
use crate::payload::{APPLICATION_JSON, FORM_URLENCODED, Payload};
use http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What a transform can see besides the body.
pub struct TransformContext<'a> {
    pub config: &'a RequestConfig,
    pub headers: &'a mut Headers,
    /// Set on the response side only
    pub status: Option<StatusCode>,
}

type TransformFn =
    dyn Fn(Payload, &mut TransformContext<'_>) -> Result<Payload, RequestError> + Send + Sync;

/// One step of a transform chain.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    pub fn new(
        f: impl Fn(Payload, &mut TransformContext<'_>) -> Result<Payload, RequestError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    /// Apply this step.
    ///
    /// # Errors
    /// Propagates the error returned by the function.
    pub fn apply(
        &self,
        data: Payload,
        ctx: &mut TransformContext<'_>,
    ) -> Result<Payload, RequestError> {
        (self.0)(data, ctx)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Run `chain` in order, threading the body through each step.
///
/// # Errors
/// Stops at and returns the first failing step's error.
pub fn run_transforms(
    chain: Option<&[Transform]>,
    mut data: Payload,
    ctx: &mut TransformContext<'_>,
) -> Result<Payload, RequestError> {
    for transform in chain.unwrap_or_default() {
        data = transform.apply(data, ctx)?;
    }
    Ok(data)
}

/// Serialize JSON bodies.
///
/// Objects become JSON text with `application/json` as a non-overriding
/// content type, or a form-encoded string when the content type is already
/// `application/x-www-form-urlencoded`. A JSON `null` becomes an empty body.
/// Text and bytes pass through unchanged.
#[must_use]
pub fn json_request() -> Transform {
    Transform::new(|data, ctx| {
        let value = match data {
            Payload::Json(value) => value,
            other => return Ok(other),
        };
        if value.is_null() {
            return Ok(Payload::Empty);
        }

        let is_form = ctx
            .headers
            .content_type()
            .is_some_and(|ct| ct.contains(FORM_URLENCODED));
        if is_form {
            return serde_urlencoded::to_string(&value)
                .map(Payload::Text)
                .map_err(RequestError::transform);
        }

        ctx.headers.set_content_type(APPLICATION_JSON, false);
        serde_json::to_string(&value)
            .map(Payload::Text)
            .map_err(RequestError::transform)
    })
}

/// Parse textual response bodies as JSON.
///
/// Parsing happens when `response_type` is `Json`, or when no response type
/// is set and `transitional.forced_json_parsing` holds. A body that fails to
/// parse is returned untouched, unless JSON was explicitly requested and
/// `transitional.silent_json_parsing` is off.
#[must_use]
pub fn json_response() -> Transform {
    Transform::new(|data, ctx| {
        let response_type = ctx.config.response_type.get().copied();
        let transitional = &ctx.config.transitional;
        let json_requested = response_type == Some(ResponseType::Json);
        let forced = response_type.is_none() && transitional.forced_json_parsing();
        if !(json_requested || forced) || data.is_empty() {
            return Ok(data);
        }

        let Some(parsed) = parse_json(&data) else {
            return Ok(data);
        };
        match parsed {
            Ok(value) => Ok(Payload::Json(value)),
            Err(e) if json_requested && !transitional.silent_json_parsing() => {
                Err(RequestError::transform(e))
            }
            Err(_) => Ok(data),
        }
    })
}

fn parse_json(data: &Payload) -> Option<Result<Value, serde_json::Error>> {
    match data {
        Payload::Text(text) => Some(serde_json::from_str(text)),
        Payload::Bytes(bytes) => Some(serde_json::from_slice(bytes)),
        Payload::Json(_) | Payload::Empty => None,
    }
}
