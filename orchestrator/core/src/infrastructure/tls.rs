// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Server-side TLS for the HTTP front door.
//!
//! Certificates and keys are PEM files. When a client CA is configured every
//! client must present a certificate chaining to it (mutual TLS).

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::config::ServerTlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to read {what} from {path}: {source}")]
    Pem {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: rustls::pki_types::pem::Error,
    },
    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),
    #[error("Invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("Invalid client CA: {0}")]
    ClientVerifier(#[from] rustls::server::VerifierBuilderError),
}

/// Build the rustls server configuration, or `None` when TLS is not configured
pub fn server_config(tls: &ServerTlsConfig) -> Result<Option<ServerConfig>, TlsError> {
    let (cert, key) = match (&tls.cert, &tls.key) {
        (Some(cert), Some(key)) => (cert, key),
        _ => return Ok(None),
    };
    debug!(cert = %cert.display(), key = %key.display(), "Loading server TLS material");

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let builder = match &tls.ca_cert {
        Some(ca) => {
            info!(ca = %ca.display(), "Client certificates required");
            builder.with_client_cert_verifier(client_verifier(ca, provider)?)
        }
        None => builder.with_no_client_auth(),
    };

    let mut config = builder.with_single_cert(load_certs(cert)?, load_key(key)?)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Some(config))
}

fn client_verifier(
    ca: &Path,
    provider: Arc<CryptoProvider>,
) -> Result<Arc<dyn rustls::server::danger::ClientCertVerifier>, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca)? {
        roots.add(cert)?;
    }
    Ok(WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider).build()?)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem_error = |source| TlsError::Pem {
        what: "certificates",
        path: path.to_path_buf(),
        source,
    };
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(pem_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(pem_error)?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_file(path).map_err(|source| TlsError::Pem {
        what: "private key",
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/tls")
            .join(name)
    }

    fn tls(ca: bool) -> ServerTlsConfig {
        ServerTlsConfig {
            cert: Some(fixture("server.pem")),
            key: Some(fixture("server.key")),
            ca_cert: ca.then(|| fixture("ca.pem")),
        }
    }

    #[test]
    fn test_unconfigured_is_plain_http() {
        assert!(server_config(&ServerTlsConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_builds_server_config() {
        let config = server_config(&tls(false)).unwrap().unwrap();
        assert_eq!(config.alpn_protocols[1], b"http/1.1");
    }

    #[test]
    fn test_builds_mutual_tls_config() {
        assert!(server_config(&tls(true)).unwrap().is_some());
    }

    #[test]
    fn test_missing_certificate_file() {
        let mut config = tls(false);
        config.cert = Some(fixture("missing.pem"));
        assert!(matches!(
            server_config(&config),
            Err(TlsError::Pem { what: "certificates", .. })
        ));
    }

    #[test]
    fn test_key_file_without_certificates() {
        let mut config = tls(false);
        config.cert = Some(fixture("server.key"));
        assert!(matches!(
            server_config(&config),
            Err(TlsError::NoCertificates(_))
        ));
    }

    #[test]
    fn test_certificate_file_is_not_a_key() {
        let mut config = tls(false);
        config.key = Some(fixture("ca.pem"));
        assert!(matches!(
            server_config(&config),
            Err(TlsError::Pem { what: "private key", .. })
        ));
    }
}
