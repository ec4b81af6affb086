//! The credentials record and the stages that read PEM text out of it.

mod cert;
mod files;
mod key;

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::context::{TlsClientContext, assemble};
use crate::error::TlsContextError;

pub use cert::{Certificate, read_certificates};
pub use key::read_private_key;

/// PEM encoded client credentials.
///
/// Every field is optional and an absent field behaves like an empty one. The record is wiped
/// from memory when dropped.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CertPemCredentials {
    /// CA certificates the server certificate is verified against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
    /// Client certificate chain, leaf first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// Client private key, possibly encrypted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Passphrase of an encrypted private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl CertPemCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ca_cert(mut self, ca_cert: impl Into<String>) -> Self {
        self.ca_cert = Some(ca_cert.into());
        self
    }

    pub fn with_cert(mut self, cert: impl Into<String>) -> Self {
        self.cert = Some(cert.into());
        self
    }

    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Builds a fresh [`TlsClientContext`] from these credentials.
    ///
    /// Nothing is cached, every call parses and decrypts the PEM text again.
    ///
    /// # Errors
    ///
    /// See [`assemble`].
    pub fn build_tls_context(&self) -> Result<TlsClientContext, TlsContextError> {
        assemble(
            field(&self.ca_cert),
            field(&self.cert),
            field(&self.private_key),
            field(&self.password),
        )
    }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

impl fmt::Debug for CertPemCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(value: &Option<String>) -> Option<&'static str> {
            value.as_ref().map(|_| "<redacted>")
        }

        f.debug_struct("CertPemCredentials")
            .field("ca_cert", &self.ca_cert)
            .field("cert", &self.cert)
            .field("private_key", &redacted(&self.private_key))
            .field("password", &redacted(&self.password))
            .finish()
    }
}
