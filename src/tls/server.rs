use std::path::Path;

use anyhow::Context;
use pki_types::{CertificateDer, PrivateKeyDer};
use rustls::crypto::ring::{default_provider, DEFAULT_CIPHER_SUITES};
use rustls::crypto::CryptoProvider;
use rustls::ServerConfig;

/// Server configuration from pem files on disk. Failing here is fatal for
/// the whole process; the server cannot start without its identity.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, anyhow::Error> {
    let f = std::fs::File::open(cert_path)
        .with_context(|| format!("cannot open certificate file {}", cert_path.display()))?;
    let mut rd = std::io::BufReader::new(f);
    let cert_chain = rustls_pemfile::certs(&mut rd)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("cannot parse certificates in {}", cert_path.display()))?;
    ensure!(
        !cert_chain.is_empty(),
        "{} holds no certificates",
        cert_path.display()
    );

    let f = std::fs::File::open(key_path)
        .with_context(|| format!("cannot open key file {}", key_path.display()))?;
    let mut rd = std::io::BufReader::new(f);
    let key = rustls_pemfile::private_key(&mut rd)?
        .ok_or_else(|| anyhow!("{} holds no private key", key_path.display()))?;

    Ok(server_config_with_identity(cert_chain, key)?)
}

pub fn server_config_with_identity(
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig, rustls::Error> {
    let versions = rustls::DEFAULT_VERSIONS.to_vec();
    let mut tls_config = ServerConfig::builder_with_provider(
        CryptoProvider {
            cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
            ..default_provider()
        }
        .into(),
    )
    .with_protocol_versions(&versions)?
    .with_no_client_auth()
    .with_single_cert(cert_chain, key)?;

    tls_config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(tls_config)
}
