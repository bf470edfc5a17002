//! Configuration merging.
//!
//! Each option has one of four strategies:
//!
//! - **override-wins**: scalars, `url`, `method`, `data`, `adapter`, the
//!   cancellation sources, and every `extensions` key
//! - **deep-merge**: `headers` (per section), `params` (recursively on JSON
//!   objects), `transitional` (per key)
//! - **override-only**: `validate_status`, never inherited from the base
//! - **list replace**: transform chains; a chain is never concatenated with
//!   the base chain
//!
//! Merging never mutates its inputs.

use crate::config::{RequestConfig, Setting, TransitionalOptions};
use crate::headers::HeaderConfig;
use serde_json::{Map, Value};

/// Combine `base` with `over`; `over` takes precedence.
#[must_use]
pub fn merge_config(base: &RequestConfig, over: &RequestConfig) -> RequestConfig {
    RequestConfig {
        url: Setting::or_inherit(&base.url, &over.url),
        base_url: Setting::or_inherit(&base.base_url, &over.base_url),
        method: Setting::or_inherit(&base.method, &over.method),
        headers: HeaderConfig::merged(&base.headers, &over.headers),
        params: merge_params(&base.params, &over.params),
        params_serializer: Setting::or_inherit(&base.params_serializer, &over.params_serializer),
        data: Setting::or_inherit(&base.data, &over.data),
        timeout: Setting::or_inherit(&base.timeout, &over.timeout),
        timeout_error_message: Setting::or_inherit(
            &base.timeout_error_message,
            &over.timeout_error_message,
        ),
        transform_request: Setting::or_inherit(&base.transform_request, &over.transform_request),
        transform_response: Setting::or_inherit(
            &base.transform_response,
            &over.transform_response,
        ),
        adapter: Setting::or_inherit(&base.adapter, &over.adapter),
        validate_status: over.validate_status.clone(),
        cancel_token: Setting::or_inherit(&base.cancel_token, &over.cancel_token),
        signal: Setting::or_inherit(&base.signal, &over.signal),
        transitional: TransitionalOptions::merged(&base.transitional, &over.transitional),
        response_type: Setting::or_inherit(&base.response_type, &over.response_type),
        max_content_length: Setting::or_inherit(&base.max_content_length, &over.max_content_length),
        max_redirects: Setting::or_inherit(&base.max_redirects, &over.max_redirects),
        auth: Setting::or_inherit(&base.auth, &over.auth),
        extensions: merge_extensions(&base.extensions, &over.extensions),
        deferred_error: over
            .deferred_error
            .clone()
            .or_else(|| base.deferred_error.clone()),
    }
}

/// Merge where either side may be absent; a single present side is copied.
#[must_use]
pub fn merge_optional(base: Option<&RequestConfig>, over: Option<&RequestConfig>) -> RequestConfig {
    match (base, over) {
        (Some(base), Some(over)) => merge_config(base, over),
        (Some(only), None) | (None, Some(only)) => only.clone(),
        (None, None) => RequestConfig::default(),
    }
}

fn merge_params(
    base: &Setting<Map<String, Value>>,
    over: &Setting<Map<String, Value>>,
) -> Setting<Map<String, Value>> {
    match (base, over) {
        (Setting::Set(base), Setting::Set(over)) => Setting::Set(deep_merge_objects(base, over)),
        _ => Setting::or_inherit(base, over),
    }
}

fn merge_extensions(base: &Map<String, Value>, over: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in over {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Recursive object merge: nested objects merge key by key, anything else
/// in `over` replaces the base value.
fn deep_merge_objects(base: &Map<String, Value>, over: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in over {
        let combined = match (merged.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                Value::Object(deep_merge_objects(existing, incoming))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}
