//! Loading credentials from PEM files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use super::CertPemCredentials;

impl CertPemCredentials {
    /// Reads the PEM text of each supplied file into a credentials record.
    ///
    /// Files that are not supplied leave their field empty.
    ///
    /// # Errors
    ///
    /// Returns an error if any supplied file cannot be read as UTF-8 text.
    pub fn from_files(
        ca_cert_path: Option<&Path>,
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
        password: Option<String>,
    ) -> Result<Self> {
        let credentials = Self {
            ca_cert: read_pem(ca_cert_path, "CA certificate")?,
            cert: read_pem(cert_path, "certificate")?,
            private_key: read_pem(key_path, "private key")?,
            password,
        };

        info!(
            "Loaded credentials from {} file(s)",
            [ca_cert_path, cert_path, key_path].iter().flatten().count()
        );

        Ok(credentials)
    }

    /// Reads a JSON credentials record (`caCert`, `cert`, `privateKey`, `password`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid record.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to open credentials file: {}", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse credentials file: {}", path.display()))
    }
}

fn read_pem(path: Option<&Path>, what: &str) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to open {what} file: {}", path.display()))?;

    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    #[test]
    fn reads_supplied_files() {
        let ca = testdata("ca.pem");
        let cert = testdata("client.pem");

        let credentials =
            CertPemCredentials::from_files(Some(&ca), Some(&cert), None, None).unwrap();

        assert_eq!(credentials.ca_cert.as_deref(), Some(include_str!("../../testdata/ca.pem")));
        assert!(credentials.cert.is_some());
        assert!(credentials.private_key.is_none());
        assert!(credentials.password.is_none());
    }

    #[test]
    fn missing_file_names_the_path() {
        let missing = testdata("missing.pem");

        let error = CertPemCredentials::from_files(None, None, Some(&missing), None).unwrap_err();

        let message = format!("{error:#}");
        assert!(message.contains("private key"));
        assert!(message.contains("missing.pem"));
    }

    #[test]
    fn invalid_json_is_reported() {
        let error = CertPemCredentials::from_json_file(&testdata("ca.pem")).unwrap_err();
        assert!(error.to_string().starts_with("Failed to parse credentials file"));
    }
}
