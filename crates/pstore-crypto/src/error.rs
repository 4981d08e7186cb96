//! Error types for cryptographic operations.

use std::path::PathBuf;

use pstore_core::VaultError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// Authentication failed: wrong key, corrupted data, or truncated blob.
    /// Deliberately carries no detail about which.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    /// The passphrase did not open a passphrase-sealed private key.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    #[error("malformed key data: {0}")]
    MalformedKeyData(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key persistence failed: {0}")]
    KeyPersistence(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl CryptoError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CryptoError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::DecryptionFailed => VaultError::DecryptionFailed,
            CryptoError::InvalidPassphrase => VaultError::InvalidPassphrase,
            CryptoError::MalformedKeyData(m) => VaultError::MalformedKeyData(m),
            CryptoError::KeyGeneration(m) => VaultError::KeyGeneration(m),
            CryptoError::KeyPersistence(m) => VaultError::KeyPersistence(m),
            CryptoError::Signing(m) => VaultError::Signing(m),
            CryptoError::SignatureMismatch => VaultError::SignatureMismatch,
            CryptoError::Io { path, source } => VaultError::StorageIo { path, source },
            e @ (CryptoError::EncryptionFailed | CryptoError::Kdf(_)) => {
                VaultError::Store(anyhow::Error::new(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_failure_carries_no_detail() {
        assert_eq!(CryptoError::DecryptionFailed.to_string(), "decryption failed");
    }

    #[test]
    fn test_maps_into_vault_kinds() {
        assert!(matches!(
            VaultError::from(CryptoError::SignatureMismatch),
            VaultError::SignatureMismatch
        ));
        assert!(matches!(
            VaultError::from(CryptoError::MalformedKeyData("bad pem".into())),
            VaultError::MalformedKeyData(_)
        ));
        assert!(matches!(
            VaultError::from(CryptoError::io(
                "/x",
                std::io::Error::new(std::io::ErrorKind::Other, "boom")
            )),
            VaultError::StorageIo { .. }
        ));
    }
}
