//! Wiring trust and identity primitives into a rustls client configuration.

use std::sync::Arc;

use log::{debug, error};
use rustls::client::ResolvesClientCert;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};

use crate::credentials::{read_certificates, read_private_key};
use crate::crypto::install_default_provider;
use crate::error::{CredentialsError, Result, TlsContextError};
use crate::store::{build_identity, build_trust};

/// A TLS client context ready to open connections.
#[derive(Debug, Clone)]
pub struct TlsClientContext {
    config: Arc<ClientConfig>,
    custom_trust: bool,
    client_identity: bool,
}

impl TlsClientContext {
    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    /// Whether server certificates are verified against the supplied CA certificates rather
    /// than the bundled Mozilla roots.
    pub fn has_custom_trust(&self) -> bool {
        self.custom_trust
    }

    /// Whether a client certificate is presented when the server asks for one.
    pub fn has_client_identity(&self) -> bool {
        self.client_identity
    }

    /// Starts a client connection to `server_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if rustls cannot start a connection with this configuration.
    pub fn connect(
        &self,
        server_name: ServerName<'static>,
    ) -> Result<ClientConnection, rustls::Error> {
        ClientConnection::new(self.config.clone(), server_name)
    }
}

/// Builds a [`TlsClientContext`] from PEM text.
///
/// - Empty `ca_cert` falls back to the bundled Mozilla roots.
/// - The client identity is only attached when both `cert` and `private_key` are non-empty.
///
/// # Errors
///
/// Any failure is logged and returned as a [`TlsContextError`] whose source is the
/// [`CredentialsError`] of the stage that failed.
pub fn assemble(
    ca_cert: &str,
    cert: &str,
    private_key: &str,
    password: &str,
) -> Result<TlsClientContext, TlsContextError> {
    build(ca_cert, cert, private_key, password).map_err(|cause| {
        error!(
            "Failed to create TLS context (CA certificate supplied: {}, \
             client certificate supplied: {}): {cause}",
            !ca_cert.is_empty(),
            !cert.is_empty()
        );
        TlsContextError(cause)
    })
}

fn build(ca_cert: &str, cert: &str, private_key: &str, password: &str) -> Result<TlsClientContext> {
    let provider = install_default_provider();

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(CredentialsError::ClientConfig)?;

    let custom_trust = !ca_cert.is_empty();
    let builder = if custom_trust {
        let ca_certs = read_certificates(ca_cert)?;
        builder.with_webpki_verifier(build_trust(&ca_certs, provider.clone())?)
    } else {
        debug!("No CA certificate supplied, trusting the bundled Mozilla roots");
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots)
    };

    let (config, client_identity) = if !cert.is_empty() && !private_key.is_empty() {
        let certs = read_certificates(cert)?;
        let key = read_private_key(private_key, password)?;
        let resolver = build_identity(&certs, key, password, &provider)?;
        let client_identity = resolver.has_certs();
        (builder.with_client_cert_resolver(resolver), client_identity)
    } else {
        debug!("No client certificate and key pair supplied, skipping client authentication");
        (builder.with_no_client_auth(), false)
    };

    Ok(TlsClientContext {
        config: Arc::new(config),
        custom_trust,
        client_identity,
    })
}
