//! TLS setup for the HTTP adapter.
//!
//! Native root certificates are loaded once per process; the OS certificate
//! store can be slow to query on some platforms.

use crate::error::{RequestError, TransportError, TransportErrorKind};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

/// Root certificate source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// OS native root certificate store
    Native,
}

/// Whether plain `http://` URLs may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// HTTPS only
    #[default]
    TlsOnly,
    /// Also allow plain HTTP. Meant for local mock servers only.
    AllowInsecureHttp,
}

/// Empty vec means no certs were found (warned, not errored).
static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_roots() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }
    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

/// Native root certificates, loaded lazily and cached for the process.
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_roots).as_slice()
}

/// The globally installed crypto provider, or a private aws-lc-rs one.
///
/// Never installs a provider globally.
pub fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn tls_error(message: &str, source: impl Into<crate::error::BoxError>) -> RequestError {
    TransportError::new(TransportErrorKind::Other, message)
        .with_source(source)
        .into()
}

/// rustls client config trusting the cached native roots.
///
/// # Errors
/// Fails when the OS store is empty or none of its certificates parse, so
/// the problem surfaces when the adapter is built rather than at handshake.
pub fn native_roots_client_config() -> Result<rustls::ClientConfig, RequestError> {
    let certs = native_root_certs();
    if certs.is_empty() {
        return Err(tls_error(
            "failed to configure TLS",
            "no native root CA certificates found in OS certificate store",
        ));
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(tls_error(
            "failed to configure TLS",
            format!("none of the {} native root CA certificates parsed", certs.len()),
        ));
    }

    let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error("failed to set TLS protocol versions", e))?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(config)
}

/// HTTPS connector advertising both h2 and http/1.1 over ALPN.
///
/// # Errors
/// Fails if the root store cannot be built.
pub fn build_https_connector(
    roots: TlsRootConfig,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, RequestError> {
    let builder = match roots {
        TlsRootConfig::WebPki => hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| tls_error("failed to configure TLS", e))?,
        TlsRootConfig::Native => {
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(native_roots_client_config()?)
        }
    };
    let connector = match transport {
        TransportSecurity::AllowInsecureHttp => builder.https_or_http().enable_all_versions().build(),
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}
