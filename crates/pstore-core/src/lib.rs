pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use error::{QuotaKind, VaultError, VaultResult};
pub use paths::VaultPaths;
pub use types::{
    now_unix, Account, FileId, LinkKeyBytes, OwnerId, Protection, ShareGrant, ShareLink,
    ShareStatus, ShareToken, StoredFile,
};
