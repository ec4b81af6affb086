//! Reading X.509 certificates out of PEM text.

use std::hash::{Hash, Hasher};

use log::debug;
use rustls::pki_types::CertificateDer;

use crate::error::Result;
use crate::scanner::{PemEntry, scan};

/// A parsed X.509 certificate.
///
/// Two certificates are equal when their DER encodings are.
#[derive(Clone, Debug)]
pub struct Certificate {
    der: CertificateDer<'static>,
    subject: String,
}

impl Certificate {
    /// Parses `der` and captures the subject name.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::CertificateDecode`](crate::CredentialsError::CertificateDecode)
    /// if `der` is not a valid X.509 certificate.
    pub fn from_der(der: CertificateDer<'static>) -> Result<Self> {
        let subject = {
            let (_, parsed) = x509_parser::parse_x509_certificate(&der)?;
            parsed.subject().to_string()
        };

        Ok(Self { der, subject })
    }

    /// Distinguished name of the subject, used to build key store aliases.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    pub fn into_der(self) -> CertificateDer<'static> {
        self.der
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der.as_ref() == other.der.as_ref()
    }
}

impl Eq for Certificate {}

impl Hash for Certificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.der.as_ref().hash(state);
    }
}

/// Reads every certificate from `text`, in the order they appear.
///
/// 1. PEM objects of other kinds are skipped.
/// 2. The first certificate that fails to parse aborts the whole read.
/// 3. Text without certificates yields an empty list.
pub fn read_certificates(text: &str) -> Result<Vec<Certificate>> {
    let mut certificates = Vec::new();

    for entry in scan(text) {
        match entry? {
            PemEntry::Certificate(der) => certificates.push(Certificate::from_der(der)?),
            PemEntry::KeyPair(..)
            | PemEntry::EncryptedKeyPair(..)
            | PemEntry::PrivateKeyInfo(..)
            | PemEntry::EncryptedPrivateKeyInfo(..)
            | PemEntry::Other { .. } => {}
        }
    }

    debug!("Read {} certificate(s)", certificates.len());

    Ok(certificates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CredentialsError, MalformedPem};

    const CA: &str = include_str!("../../testdata/ca.pem");
    const CLIENT: &str = include_str!("../../testdata/client.pem");
    const SERVER: &str = include_str!("../../testdata/server.pem");
    const CLIENT_RSA: &str = include_str!("../../testdata/client-rsa.key");

    #[test]
    fn reads_certificates_in_order() {
        let chain = format!("{CLIENT}{SERVER}{CA}");

        let certificates = read_certificates(&chain).unwrap();

        let subjects = certificates
            .iter()
            .map(Certificate::subject)
            .collect::<Vec<_>>();
        assert_eq!(subjects.len(), 3);
        assert!(subjects[0].contains("CN=client.test"));
        assert!(subjects[1].contains("CN=localhost"));
        assert!(subjects[2].contains("CN=Test Root CA"));
    }

    #[test]
    fn skips_keys() {
        let text = format!("{CLIENT_RSA}{CLIENT}");

        let certificates = read_certificates(&text).unwrap();
        assert_eq!(certificates.len(), 1);
    }

    #[test]
    fn no_certificates() {
        assert!(read_certificates("").unwrap().is_empty());
        assert!(read_certificates(CLIENT_RSA).unwrap().is_empty());
    }

    #[test]
    fn equality_is_by_encoding() {
        let first = read_certificates(CLIENT).unwrap();
        let second = read_certificates(CLIENT).unwrap();
        let ca = read_certificates(CA).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, ca);
    }

    #[test]
    fn invalid_der_aborts_the_read() {
        // A well framed block holding `30 03 02 01 00`, which is no certificate.
        let text =
            format!("{CLIENT}-----BEGIN CERTIFICATE-----\nMAMCAQA=\n-----END CERTIFICATE-----\n");

        assert!(matches!(
            read_certificates(&text),
            Err(CredentialsError::CertificateDecode(..))
        ));
    }

    #[test]
    fn malformed_pem_is_reported() {
        let truncated = &CA[..CA.len() / 2];

        assert!(matches!(
            read_certificates(truncated),
            Err(CredentialsError::MalformedPem(MalformedPem::Unterminated(..)))
        ));
    }
}
