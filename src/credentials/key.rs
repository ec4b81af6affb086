//! Resolving the client private key out of PEM text.

use log::debug;
use pkcs8::der::{Decode, asn1::SequenceRef};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer};

use crate::error::{CredentialsError, Result};
use crate::scanner::{KeyAlgorithm, KeyPair, PemEntry, scan};

/// Reads the private key from `text`, decrypting it with `passphrase` when needed.
///
/// Returns [`None`] when `text` is empty or holds no key at all.
///
/// Entries are inspected in order and the first legacy key pair (plain or encrypted) or
/// encrypted PKCS#8 key ends the search. A plain PKCS#8 key is remembered, but a later key entry
/// still replaces it.
///
/// # Errors
///
/// Returns an error if:
/// - the PEM text is malformed
/// - an encrypted key is found and `passphrase` is empty
/// - decryption fails
/// - the key material is not a well-formed private key, or is a DSA key
pub fn read_private_key(text: &str, passphrase: &str) -> Result<Option<PrivateKeyDer<'static>>> {
    if text.is_empty() {
        return Ok(None);
    }

    let mut private_key = None;

    for entry in scan(text) {
        match entry? {
            PemEntry::KeyPair(pair) => {
                debug!("Using plain {} key pair", pair.algorithm.name());
                private_key = Some(key_pair_to_der(pair)?);
                break;
            }
            PemEntry::EncryptedKeyPair(encrypted) => {
                let passphrase = require_passphrase(passphrase)?;
                debug!(
                    "Decrypting {} key pair encrypted with {}",
                    encrypted.algorithm.name(),
                    encrypted.cipher
                );
                private_key = Some(key_pair_to_der(encrypted.decrypt(passphrase)?)?);
                break;
            }
            PemEntry::EncryptedPrivateKeyInfo(encrypted) => {
                let passphrase = require_passphrase(passphrase)?;
                debug!("Decrypting PKCS#8 private key");
                private_key = Some(PrivateKeyDer::Pkcs8(encrypted.decrypt(passphrase)?));
                break;
            }
            PemEntry::PrivateKeyInfo(info) => {
                debug!("Found plain PKCS#8 private key");
                private_key = Some(PrivateKeyDer::Pkcs8(check_pkcs8(info)?));
            }
            PemEntry::Certificate(..) | PemEntry::Other { .. } => {}
        }
    }

    Ok(private_key)
}

fn require_passphrase(passphrase: &str) -> Result<&str> {
    if passphrase.is_empty() {
        return Err(CredentialsError::MissingPassphrase);
    }

    Ok(passphrase)
}

fn key_pair_to_der(pair: KeyPair) -> Result<PrivateKeyDer<'static>> {
    if SequenceRef::from_der(&pair.der).is_err() {
        return Err(CredentialsError::InvalidKey {
            label: pair.algorithm.label().to_owned(),
        });
    }

    let key = match pair.algorithm {
        KeyAlgorithm::Rsa => PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(pair.der.to_vec())),
        KeyAlgorithm::Ec => PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(pair.der.to_vec())),
        // Nothing in the TLS stack can sign with DSA.
        KeyAlgorithm::Dsa => return Err(CredentialsError::UnsupportedKey(pair.algorithm.name())),
    };

    Ok(key)
}

fn check_pkcs8(info: PrivatePkcs8KeyDer<'static>) -> Result<PrivatePkcs8KeyDer<'static>> {
    match pkcs8::PrivateKeyInfo::try_from(info.secret_pkcs8_der()) {
        Ok(..) => Ok(info),
        Err(..) => Err(CredentialsError::InvalidKey {
            label: "PRIVATE KEY".to_owned(),
        }),
    }
}
