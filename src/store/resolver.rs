use std::sync::Arc;

use log::{debug, warn};
use rustls::client::ResolvesClientCert;
use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls::{InconsistentKeys, SignatureScheme};

use super::{KeyStore, PRIVATE_KEY_ALIAS};
use crate::error::StoreError;

/// Presents the client identity held by an identity [`KeyStore`].
///
/// The same certificate path and key are offered for every server, whatever CA hints or
/// signature schemes it sends.
#[derive(Debug)]
pub struct KeyStoreCertResolver {
    certified_key: Option<Arc<CertifiedKey>>,
}

impl KeyStoreCertResolver {
    /// Loads the `private-key` entry of `store` through `provider`.
    ///
    /// A store without a key entry yields a resolver that offers no identity.
    ///
    /// # Errors
    ///
    /// Returns an error if `passphrase` does not unlock the key entry or the provider cannot sign
    /// with the key.
    pub fn new(
        store: &KeyStore,
        passphrase: &str,
        provider: &CryptoProvider,
    ) -> Result<Self, StoreError> {
        let Some(entry) = store.key_entry(PRIVATE_KEY_ALIAS, passphrase)? else {
            debug!("Identity store has no private key, no client certificate will be sent");
            return Ok(Self {
                certified_key: None,
            });
        };

        let signing_key = provider
            .key_provider
            .load_private_key(entry.key().clone_key())
            .map_err(|error| StoreError::InvalidKey {
                error,
                alias: PRIVATE_KEY_ALIAS.to_owned(),
            })?;

        let certified_key = CertifiedKey::new(entry.chain().to_vec(), signing_key);

        match certified_key.keys_match() {
            Ok(()) => debug!(
                "Client identity with {} certificate(s) in its path",
                certified_key.cert.len()
            ),
            Err(rustls::Error::InconsistentKeys(InconsistentKeys::KeyMismatch)) => {
                warn!("Private key does not match the first client certificate")
            }
            Err(error) => debug!("Could not compare private key and certificate: {error}"),
        }

        Ok(Self {
            certified_key: Some(Arc::new(certified_key)),
        })
    }

    pub fn certified_key(&self) -> Option<&Arc<CertifiedKey>> {
        self.certified_key.as_ref()
    }
}

impl ResolvesClientCert for KeyStoreCertResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.certified_key.clone()
    }

    fn has_certs(&self) -> bool {
        self.certified_key.is_some()
    }
}
