//! Option schema validation.
//!
//! A schema maps option names to validators. A validator returns `None`
//! when the value is acceptable and a short reason otherwise. Values are
//! never coerced.

use crate::config::{ParamsSerializerOptions, TransitionalOptions};
use crate::error::ConfigurationError;
use serde_json::{Map, Value};

/// Checks one option value; `Some(reason)` rejects it.
pub type Validator = fn(&Value) -> Option<String>;

pub fn boolean(value: &Value) -> Option<String> {
    (!value.is_boolean()).then(|| format!("must be a boolean, got {}", type_name(value)))
}

pub fn boolean_or_null(value: &Value) -> Option<String> {
    (!(value.is_boolean() || value.is_null()))
        .then(|| format!("must be a boolean or null, got {}", type_name(value)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

const TRANSITIONAL_SCHEMA: &[(&str, Validator)] = &[
    (TransitionalOptions::SILENT_JSON_PARSING, boolean),
    (TransitionalOptions::FORCED_JSON_PARSING, boolean),
    (TransitionalOptions::CLARIFY_TIMEOUT_ERROR, boolean),
];

const PARAMS_SERIALIZER_SCHEMA: &[(&str, Validator)] =
    &[("indexes", boolean_or_null), ("dots", boolean)];

/// Validate `options` against `schema`.
///
/// Errors name the offending option as `prefix.key`.
///
/// # Errors
/// Returns the first `ConfigurationError` found, in key order.
pub fn assert_options(
    prefix: &str,
    options: &Map<String, Value>,
    schema: &[(&str, Validator)],
    allow_unknown: bool,
) -> Result<(), ConfigurationError> {
    for (key, value) in options {
        let option = format!("{prefix}.{key}");
        match schema.iter().find(|(name, _)| *name == key.as_str()) {
            Some((_, validator)) => {
                if let Some(reason) = validator(value) {
                    return Err(ConfigurationError::invalid(option, reason));
                }
            }
            None if allow_unknown => {}
            None => return Err(ConfigurationError::unknown(option)),
        }
    }
    Ok(())
}

/// Every `transitional` key must be known and boolean.
///
/// # Errors
/// Returns `ConfigurationError` naming the offending key.
pub fn validate_transitional(options: &TransitionalOptions) -> Result<(), ConfigurationError> {
    assert_options("transitional", options.as_map(), TRANSITIONAL_SCHEMA, false)
}

/// Known serializer switches must have the right type; unknown ones pass.
///
/// # Errors
/// Returns `ConfigurationError` naming the offending key.
pub fn validate_params_serializer(
    options: &ParamsSerializerOptions,
) -> Result<(), ConfigurationError> {
    assert_options(
        "params_serializer",
        &options.options,
        PARAMS_SERIALIZER_SCHEMA,
        true,
    )
}
