// ABOUTME: Loads the server keystore (PEM certificate chain plus private key) into rustls.
// ABOUTME: Takes the keystore location explicitly, from materialization or configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::pem::{self, PemObject};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;

/// Errors that can occur while building the TLS configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read keystore {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keystore {} contains no PEM certificates", .path.display())]
    NoCertificates { path: PathBuf },

    #[error("keystore {} contains no PEM private key", .path.display())]
    NoPrivateKey { path: PathBuf },

    #[error("keystore {} is not valid PEM: {source}", .path.display())]
    Pem {
        path: PathBuf,
        #[source]
        source: pem::Error,
    },

    #[error("rustls rejected keystore {}: {source}", .path.display())]
    Rustls {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },
}

/// Build a rustls `ServerConfig` from the keystore at `path`.
///
/// The file must hold one or more `CERTIFICATE` blocks (leaf first) and one
/// private key block (PKCS#8, PKCS#1 or SEC1).
pub fn load_keystore(path: &Path) -> Result<Arc<ServerConfig>, TlsError> {
    let bytes = fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = server_config_from_pem(&bytes).map_err(|err| err.at(path))?;
    tracing::info!(path = %path.display(), "loaded TLS keystore");
    Ok(config)
}

/// Errors from parsing before the keystore path is attached.
enum PemFailure {
    NoCertificates,
    NoPrivateKey,
    Pem(pem::Error),
    Rustls(rustls::Error),
}

impl PemFailure {
    fn at(self, path: &Path) -> TlsError {
        let path = path.to_path_buf();
        match self {
            Self::NoCertificates => TlsError::NoCertificates { path },
            Self::NoPrivateKey => TlsError::NoPrivateKey { path },
            Self::Pem(source) => TlsError::Pem { path, source },
            Self::Rustls(source) => TlsError::Rustls { path, source },
        }
    }
}

fn server_config_from_pem(pem: &[u8]) -> Result<Arc<ServerConfig>, PemFailure> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(PemFailure::Pem)?;
    if certs.is_empty() {
        return Err(PemFailure::NoCertificates);
    }

    let key = PrivateKeyDer::from_pem_slice(pem).map_err(|err| match err {
        pem::Error::NoItemsFound => PemFailure::NoPrivateKey,
        other => PemFailure::Pem(other),
    })?;

    let provider = Arc::new(aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(PemFailure::Rustls)?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(PemFailure::Rustls)?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
