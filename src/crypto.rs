//! Process-wide rustls crypto provider.

use std::sync::Arc;

use log::debug;
use rustls::crypto::{CryptoProvider, ring};

/// Installs the `ring` provider as the process default unless one is already installed, and
/// returns the provider in effect.
///
/// Can be called any number of times, from any thread.
pub fn install_default_provider() -> Arc<CryptoProvider> {
    if let Some(provider) = CryptoProvider::get_default() {
        return provider.clone();
    }

    match ring::default_provider().install_default() {
        Ok(()) => debug!("Installed ring as the default crypto provider"),
        Err(..) => debug!("Another thread installed the default crypto provider first"),
    }

    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(ring::default_provider()))
}
