use rustls::client::VerifierBuilderError;
use thiserror::Error;
use x509_parser::{error::X509Error, nom};

/// Errors produced while scanning PEM text into [`PemEntry`](crate::scanner::PemEntry) values.
#[derive(Error, Debug)]
pub enum MalformedPem {
    #[error("no END line found for `{0}` block")]
    Unterminated(String),
    #[error("mismatching BEGIN (`{begin}`) and END (`{end}`) labels")]
    MismatchedLabels { begin: String, end: String },
    #[error("unrecognised PEM object `{0}`")]
    UnrecognisedObject(String),
    #[error("`{label}` block has an invalid `{header}` header")]
    InvalidHeader { label: String, header: &'static str },
    #[error("failed to decode `{label}` block: {error}")]
    Decode {
        #[source]
        error: pem::PemError,
        label: String,
    },
}

/// Reasons an encrypted private key could not be turned into plain key material.
#[derive(Error, Debug)]
pub enum KeyDecryptionError {
    #[error("unsupported PEM encryption cipher `{0}`")]
    UnsupportedCipher(String),
    #[error("unsupported PKCS#8 encryption scheme {0}")]
    UnsupportedScheme(String),
    #[error("IV of {actual} bytes does not fit cipher `{cipher}`")]
    InvalidIv { cipher: &'static str, actual: usize },
    #[error("bad decrypt (wrong passphrase or corrupt key)")]
    BadDecrypt,
    #[error("PKCS#8 decryption failed: {0}")]
    Pkcs8(#[from] pkcs8::Error),
}

/// Errors from the underlying TLS stack while turning a key store into a trust or identity
/// primitive.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("certificate `{alias}` was rejected: {error}")]
    InvalidCertificate {
        #[source]
        error: rustls::Error,
        alias: String,
    },
    #[error("failed to build server verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),
    #[error("private key `{alias}` could not be loaded: {error}")]
    InvalidKey {
        #[source]
        error: rustls::Error,
        alias: String,
    },
    #[error("passphrase does not unlock key entry `{0}`")]
    Unrecoverable(String),
}

/// Errors surfaced by the individual stages of turning PEM credentials into TLS material.
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("malformed PEM: {0}")]
    MalformedPem(#[from] MalformedPem),
    #[error("certificate decode error: {0}")]
    CertificateDecode(#[from] nom::Err<X509Error>),
    #[error("encrypted private key requires a passphrase")]
    MissingPassphrase,
    #[error("key decryption error: {0}")]
    KeyDecryption(#[from] KeyDecryptionError),
    #[error("`{label}` block does not hold a well-formed private key")]
    InvalidKey { label: String },
    #[error("{0} private keys are not supported")]
    UnsupportedKey(&'static str),
    #[error("trust store build error: {0}")]
    TrustStore(#[source] StoreError),
    #[error("identity store build error: {0}")]
    IdentityStore(#[source] StoreError),
    #[error("certificate path error: {0}")]
    CertificatePath(&'static str),
    #[error("failed to prepare client configuration: {0}")]
    ClientConfig(#[source] rustls::Error),
}

/// The single failure surfaced by [`CertPemCredentials::build_tls_context`].
///
/// The stage that failed is kept as the [`source`](std::error::Error::source).
///
/// [`CertPemCredentials::build_tls_context`]: crate::CertPemCredentials::build_tls_context
#[derive(Error, Debug)]
#[error("creating TLS context failed")]
pub struct TlsContextError(#[from] pub CredentialsError);

pub type Result<T, E = CredentialsError> = std::result::Result<T, E>;
