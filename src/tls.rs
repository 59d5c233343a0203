//! TLS Setup
//!
//! Loads the server certificate chain and private key from PEM files and
//! builds the rustls acceptor used by the RPC endpoint.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::error::{Error, Result};

/// Build a rustls server configuration from PEM-encoded certificate and
/// key files
pub fn load_server_config(cert_file: &Path, key_file: &Path) -> Result<rustls::ServerConfig> {
    let certs = load_certs(cert_file)?;
    let key = load_private_key(key_file)?;

    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Tls(format!("invalid certificate or key: {}", e)))
}

/// Wrap a server configuration into an async acceptor
pub fn acceptor(config: rustls::ServerConfig) -> TlsAcceptor {
    TlsAcceptor::from(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Tls(format!("cannot open certificate file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    let certs: std::io::Result<Vec<_>> = rustls_pemfile::certs(&mut reader).collect();
    let certs = certs.map_err(|e| Error::Tls(format!("cannot parse {:?}: {}", path, e)))?;

    if certs.is_empty() {
        return Err(Error::Tls(format!("no certificates found in {:?}", path)));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Tls(format!("cannot open key file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Tls(format!("cannot parse {:?}: {}", path, e)))?
        .ok_or_else(|| Error::Tls(format!("no private key found in {:?}", path)))
}
