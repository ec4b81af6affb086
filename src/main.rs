use std::path::PathBuf;

use anyhow::{Context, Result};
use certpem::CertPemCredentials;
use clap::Parser;
use log::info;
use rustls::pki_types::ServerName;

/// Builds a TLS client context from PEM credentials and reports what it holds.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON credentials file with `caCert`, `cert`, `privateKey` and `password` fields
    #[clap(long, conflicts_with_all = ["ca_cert", "cert", "private_key"])]
    config: Option<PathBuf>,

    /// PEM file with the CA certificates to trust
    #[clap(long)]
    ca_cert: Option<PathBuf>,

    /// PEM file with the client certificate chain
    #[clap(long)]
    cert: Option<PathBuf>,

    /// PEM file with the client private key
    #[clap(long)]
    private_key: Option<PathBuf>,

    /// Passphrase of an encrypted private key
    #[clap(long, env = "CERTPEM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Server name to start a client connection for
    #[clap(long)]
    server_name: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    certpem::crypto::install_default_provider();

    let args = Args::parse();

    let mut credentials = match &args.config {
        Some(path) => CertPemCredentials::from_json_file(path)?,
        None => CertPemCredentials::from_files(
            args.ca_cert.as_deref(),
            args.cert.as_deref(),
            args.private_key.as_deref(),
            None,
        )?,
    };
    if let Some(password) = args.password {
        credentials = credentials.with_password(password);
    }

    let context = credentials
        .build_tls_context()
        .context("Failed to build TLS client context")?;

    info!(
        "TLS client context ready (custom trust: {}, client identity: {})",
        context.has_custom_trust(),
        context.has_client_identity()
    );

    if let Some(server_name) = args.server_name {
        let server_name = ServerName::try_from(server_name)
            .context("Invalid server name")?;
        let connection = context.connect(server_name)?;
        info!("Client connection started, handshaking: {}", connection.is_handshaking());
    }

    Ok(())
}
