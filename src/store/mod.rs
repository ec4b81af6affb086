//! Alias-keyed certificate/key collections and the TLS primitives built from them.
//!
//! CA certificates end up in a trust [`KeyStore`] that feeds a [`WebPkiServerVerifier`]. The
//! client certificate chain and private key end up in an identity [`KeyStore`] that feeds a
//! [`KeyStoreCertResolver`].

mod resolver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use rustls::RootCertStore;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use zeroize::Zeroizing;

use crate::credentials::Certificate;
use crate::error::{CredentialsError, Result, StoreError};

pub use resolver::KeyStoreCertResolver;

/// Alias prefix of the CA certificates in the trust store.
pub const CA_CERT_ALIAS_PREFIX: &str = "caCert-cert-";
/// Alias prefix of the client certificates in the identity store.
pub const CERT_ALIAS_PREFIX: &str = "cert-";
/// Alias of the client private key in the identity store.
pub const PRIVATE_KEY_ALIAS: &str = "private-key";

/// A private key together with its certificate path.
pub struct KeyEntry {
    key: PrivateKeyDer<'static>,
    chain: Vec<CertificateDer<'static>>,
    protection: Zeroizing<String>,
}

impl KeyEntry {
    pub fn key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    /// The certificate path, leaf first, exactly as it was supplied.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("chain", &self.chain.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Entry {
    Certificate(Certificate),
    PrivateKey(KeyEntry),
}

/// In-memory collection of certificates and keys addressed by alias.
///
/// Setting an entry under an existing alias replaces the old entry.
#[derive(Debug, Default)]
pub struct KeyStore {
    entries: BTreeMap<String, Entry>,
}

impl KeyStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stores `certificate` under `alias`, returning the entry it replaced.
    pub fn set_certificate_entry(
        &mut self,
        alias: impl Into<String>,
        certificate: Certificate,
    ) -> Option<Entry> {
        self.entries.insert(alias.into(), Entry::Certificate(certificate))
    }

    /// Stores `key` with its certificate path under `alias`, protected by `passphrase`.
    pub fn set_key_entry(
        &mut self,
        alias: impl Into<String>,
        key: PrivateKeyDer<'static>,
        passphrase: &str,
        chain: Vec<CertificateDer<'static>>,
    ) -> Option<Entry> {
        let entry = KeyEntry {
            key,
            chain,
            protection: Zeroizing::new(passphrase.to_owned()),
        };

        self.entries.insert(alias.into(), Entry::PrivateKey(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Certificate entries with their aliases.
    pub fn certificates(&self) -> impl Iterator<Item = (&str, &Certificate)> {
        self.entries
            .iter()
            .filter_map(|(alias, entry)| match entry {
                Entry::Certificate(certificate) => Some((alias.as_str(), certificate)),
                Entry::PrivateKey(..) => None,
            })
    }

    /// Returns the key entry stored under `alias`, unlocked with `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unrecoverable`] if `passphrase` is not the one the entry was stored
    /// with.
    pub fn key_entry(
        &self,
        alias: &str,
        passphrase: &str,
    ) -> Result<Option<&KeyEntry>, StoreError> {
        match self.entries.get(alias) {
            Some(Entry::PrivateKey(entry)) if entry.protection.as_str() == passphrase => {
                Ok(Some(entry))
            }
            Some(Entry::PrivateKey(..)) => Err(StoreError::Unrecoverable(alias.to_owned())),
            Some(Entry::Certificate(..)) | None => Ok(None),
        }
    }
}

/// Collects CA certificates under `caCert-cert-<subject>` aliases.
///
/// CA certificates sharing a subject end up under one alias, the last one wins.
pub fn trust_key_store(ca_certs: &[Certificate]) -> KeyStore {
    let mut store = KeyStore::empty();

    for certificate in ca_certs {
        let alias = format!("{CA_CERT_ALIAS_PREFIX}{}", certificate.subject());
        if store.set_certificate_entry(alias, certificate.clone()).is_some() {
            debug!(
                "CA certificate for `{}` replaced an earlier one with the same subject",
                certificate.subject()
            );
        }
    }

    store
}

/// Builds the server certificate verifier that trusts exactly `ca_certs`.
///
/// # Errors
///
/// Returns [`CredentialsError::TrustStore`] if a certificate cannot serve as a trust anchor or
/// the verifier cannot be built, e.g. when there are no anchors at all.
pub fn build_trust(
    ca_certs: &[Certificate],
    provider: Arc<CryptoProvider>,
) -> Result<Arc<WebPkiServerVerifier>> {
    let store = trust_key_store(ca_certs);
    let mut roots = RootCertStore::empty();

    for (alias, certificate) in store.certificates() {
        roots.add(certificate.der().clone()).map_err(|error| {
            CredentialsError::TrustStore(StoreError::InvalidCertificate {
                error,
                alias: alias.to_owned(),
            })
        })?;
    }

    debug!("Trusting {} CA certificate(s)", roots.len());

    WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
        .build()
        .map_err(|error| CredentialsError::TrustStore(error.into()))
}

/// Collects the client certificates under `cert-<subject>` aliases and, when there is a key,
/// stores it under [`PRIVATE_KEY_ALIAS`].
///
/// Aliases come from the chain with duplicates removed (first occurrence kept), while the key's
/// certificate path is the chain exactly as supplied.
///
/// # Errors
///
/// Returns [`CredentialsError::CertificatePath`] if there is a key but no certificate.
pub fn identity_key_store(
    certs: &[Certificate],
    key: Option<PrivateKeyDer<'static>>,
    passphrase: &str,
) -> Result<KeyStore> {
    let mut store = KeyStore::empty();

    for certificate in certs.iter().unique() {
        let alias = format!("{CERT_ALIAS_PREFIX}{}", certificate.subject());
        if store.set_certificate_entry(alias, certificate.clone()).is_some() {
            debug!(
                "Client certificate for `{}` replaced an earlier one with the same subject",
                certificate.subject()
            );
        }
    }

    if let Some(key) = key {
        let path = certificate_path(certs)?;
        store.set_key_entry(PRIVATE_KEY_ALIAS, key, passphrase, path);
    }

    Ok(store)
}

fn certificate_path(certs: &[Certificate]) -> Result<Vec<CertificateDer<'static>>> {
    if certs.is_empty() {
        return Err(CredentialsError::CertificatePath(
            "no certificate to pair with the private key",
        ));
    }

    Ok(certs.iter().map(|certificate| certificate.der().clone()).collect())
}

/// Builds the client identity presented during the handshake.
///
/// # Errors
///
/// Returns [`CredentialsError::CertificatePath`] as [`identity_key_store`] does, and
/// [`CredentialsError::IdentityStore`] if the key cannot be loaded by `provider`.
pub fn build_identity(
    certs: &[Certificate],
    key: Option<PrivateKeyDer<'static>>,
    passphrase: &str,
    provider: &CryptoProvider,
) -> Result<Arc<KeyStoreCertResolver>> {
    let store = identity_key_store(certs, key, passphrase)?;

    KeyStoreCertResolver::new(&store, passphrase, provider)
        .map(Arc::new)
        .map_err(CredentialsError::IdentityStore)
}
