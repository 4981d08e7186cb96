use std::path::PathBuf;

use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Which allowance a `QuotaExceeded` rejection refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaKind {
    /// Owner storage allowance, in bytes
    Storage {
        used: u64,
        requested: u64,
        allowance: u64,
    },
    /// Per-recipient download quota of a share link
    Downloads { quota: u32 },
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaKind::Storage {
                used,
                requested,
                allowance,
            } => write!(
                f,
                "storage allowance of {allowance} bytes would be exceeded ({used} used, {requested} requested)"
            ),
            QuotaKind::Downloads { quota } => write!(f, "download limit of {quota} reached"),
        }
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// Tamper or corruption: the recomputed digest does not verify.
    #[error("signature mismatch: unauthorized file alteration detected")]
    SignatureMismatch,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key persistence failed: {0}")]
    KeyPersistence(String),

    #[error("malformed key data: {0}")]
    MalformedKeyData(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// A link-scoped blob failed AEAD authentication.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("storage I/O error at {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(QuotaKind),

    /// A catalog record exists but its blob is missing from disk.
    #[error("file data missing for {0}")]
    FileNotFound(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("expiry must be in the future")]
    InvalidExpiry,

    #[error("invalid download quota: {0} (must be at least 1)")]
    InvalidQuota(u32),

    #[error("share link has expired")]
    LinkExpired,

    #[error("share link has been revoked")]
    LinkRevoked,

    #[error("share link already revoked")]
    AlreadyRevoked,

    #[error("config error: {0}")]
    Config(String),

    /// A collaborator (account store, catalog, ledger) failed.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl VaultError {
    pub fn storage_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaultError::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// True for caller-side rejections (bad input, missing rights, exhausted
    /// allowances); false for failures that indicate corruption or an
    /// infrastructure fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            VaultError::InvalidPassphrase
                | VaultError::QuotaExceeded(_)
                | VaultError::PermissionDenied
                | VaultError::InvalidExpiry
                | VaultError::InvalidQuota(_)
                | VaultError::LinkExpired
                | VaultError::LinkRevoked
                | VaultError::AlreadyRevoked
        )
    }
}
