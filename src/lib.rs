//! # certpem
//!
//! Turns PEM encoded client credentials into a ready-to-use rustls client context.
//!
//! The credentials are the CA certificates to trust, the client certificate chain, the client
//! private key and the passphrase protecting it. Each piece is optional.
//!
//! ## Features
//!
//! - Certificates and keys read from a single PEM blob in any order
//! - PKCS#1, SEC1 and PKCS#8 private keys, plain or encrypted
//! - Legacy OpenSSL `DEK-Info` encryption (AES-CBC, 3DES, DES) and PKCS#8 PBES2
//! - Falls back to the Mozilla root set when no CA certificate is given
//!
//! ## Example
//!
//! ```no_run
//! use certpem::CertPemCredentials;
//! use rustls::pki_types::ServerName;
//!
//! fn main() -> anyhow::Result<()> {
//!     certpem::crypto::install_default_provider();
//!
//!     let credentials = CertPemCredentials::new()
//!         .with_ca_cert(std::fs::read_to_string("certs/ca.pem")?)
//!         .with_cert(std::fs::read_to_string("certs/client.pem")?)
//!         .with_private_key(std::fs::read_to_string("certs/client.key")?)
//!         .with_password("changeit");
//!
//!     let context = credentials.build_tls_context()?;
//!     let _connection = context.connect(ServerName::try_from("example.com")?)?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod scanner;
pub mod store;

pub use context::{TlsClientContext, assemble};
pub use credentials::{CertPemCredentials, Certificate, read_certificates, read_private_key};
pub use error::{CredentialsError, TlsContextError};
pub use scanner::{PemEntry, scan};
