//! Execution of one resolved configuration.
//!
//! Headers are flattened, the request body transformed, the adapter resolved
//! and invoked, and its result (or the response carried by its error)
//! transformed back. Cancellation is checked on entry and again as soon as
//! the adapter settles.

use crate::adapter::{AdapterPreference, AdapterRegistry, DEFAULT_ADAPTERS};
use crate::cancel::throw_if_cancellation_requested;
use crate::config::{RequestConfig, Setting};
use crate::error::RequestError;
use crate::headers::HeaderConfig;
use crate::payload::{FORM_URLENCODED, Payload};
use crate::response::Response;
use crate::transform::{TransformContext, run_transforms};
use http::Method;

/// Send `config` through the adapter it resolves to.
///
/// # Errors
/// Cancellation, adapter resolution, transform and transport failures. A
/// cancellation observed after the adapter settles replaces whatever the
/// adapter returned.
pub async fn dispatch_request(
    mut config: RequestConfig,
    registry: &AdapterRegistry,
) -> Result<Response, RequestError> {
    throw_if_cancellation_requested(&config)?;

    let method = config.method.get().cloned().unwrap_or(Method::GET);
    let mut headers = config.headers.flatten(&method).values().clone();

    let data = config.data.clone().into_option().unwrap_or_default();
    let data = {
        let mut ctx = TransformContext {
            config: &config,
            headers: &mut headers,
            status: None,
        };
        run_transforms(config.transform_request.get().map(Vec::as_slice), data, &mut ctx)?
    };

    if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        headers.set_content_type(FORM_URLENCODED, false);
    }

    config.headers = HeaderConfig::from(headers);
    if config.data.is_set() || !data.is_empty() {
        config.data = Setting::Set(data);
    }

    let default_preference;
    let preference = match config.adapter.get() {
        Some(preference) => preference,
        None => {
            default_preference = AdapterPreference::names(DEFAULT_ADAPTERS.iter().copied());
            &default_preference
        }
    };
    let adapter = registry.resolve(preference)?;
    tracing::debug!(adapter = adapter.name(), %method, "dispatching request");

    let settled = adapter.send(&config).await;
    match settled {
        Ok(mut response) => {
            throw_if_cancellation_requested(&config)?;
            transform_response_data(&config, &mut response)?;
            response.config = config;
            Ok(response)
        }
        Err(mut err) => {
            if !err.is_cancel() {
                throw_if_cancellation_requested(&config)?;
                if let Some(response) = err.response_mut() {
                    transform_response_data(&config, response)?;
                    response.config = config;
                }
            }
            tracing::debug!(error = %err, "request rejected");
            Err(err)
        }
    }
}

fn transform_response_data(
    config: &RequestConfig,
    response: &mut Response,
) -> Result<(), RequestError> {
    let data = std::mem::take(&mut response.data);
    let mut ctx = TransformContext {
        config,
        headers: &mut response.headers,
        status: Some(response.status),
    };
    response.data = run_transforms(config.transform_response.get().map(Vec::as_slice), data, &mut ctx)?;
    Ok(())
}
