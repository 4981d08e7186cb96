//! Collaborator interfaces the engine is constructed with.
//!
//! Every store is injected explicitly; nothing reaches for a process-wide
//! handle. Implementations must be safe to call from concurrent requests and
//! must perform the counter operations below atomically.

use anyhow::Result;
use pstore_core::{Account, FileId, OwnerId, ShareGrant, ShareLink, ShareToken, StoredFile};

/// Owner id → passphrase hash, public key, sealed private key, storage quota.
pub trait AccountStore: Send + Sync {
    fn account(&self, owner: OwnerId) -> Result<Option<Account>>;

    /// Fails if an account already exists for `account.owner`.
    fn insert_account(&self, account: Account) -> Result<()>;
}

/// Metadata for stored files.
pub trait FileCatalog: Send + Sync {
    fn insert_file(&self, file: StoredFile) -> Result<()>;

    fn file(&self, file_id: &FileId) -> Result<Option<StoredFile>>;

    fn files_of(&self, owner: OwnerId) -> Result<Vec<StoredFile>>;

    /// Increment `download_count` and set `last_accessed` in one step.
    /// Returns the new count, or `None` if the record is gone.
    fn record_download(&self, file_id: &FileId, at: u64) -> Result<Option<u64>>;

    fn remove_file(&self, file_id: &FileId) -> Result<Option<StoredFile>>;
}

/// Outcome of [`ShareLedger::consume_grant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantUse {
    /// The counter was below quota and has been incremented.
    Consumed { download_count: u32 },
    /// The counter already equals the link's quota. Nothing changed.
    Exhausted,
    /// No grant exists for this recipient (or no such link).
    NoGrant,
    /// The link was revoked. Nothing changed.
    Revoked,
}

/// Share links and their per-recipient grants.
pub trait ShareLedger: Send + Sync {
    /// Store a link together with its grants.
    fn insert_link(&self, link: ShareLink, grants: Vec<ShareGrant>) -> Result<()>;

    fn link(&self, token: &ShareToken) -> Result<Option<ShareLink>>;

    fn links(&self) -> Result<Vec<ShareLink>>;

    fn grant(&self, link_id: &str, recipient: OwnerId) -> Result<Option<ShareGrant>>;

    /// Check the quota and increment the grant counter as a single step.
    fn consume_grant(&self, token: &ShareToken, recipient: OwnerId) -> Result<GrantUse>;

    /// Move a link from Shared to Revoked. Returns `false` if it was already
    /// revoked or does not exist.
    fn revoke(&self, token: &ShareToken) -> Result<bool>;
}

/// Bytes currently charged to an owner.
pub trait UsageAccountant: Send + Sync {
    fn usage(&self, owner: OwnerId) -> Result<u64>;
}

/// Events the engine reports after a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    FileUploaded {
        owner: OwnerId,
        file_id: FileId,
        original_name: String,
        size: u64,
    },
    LinkShared {
        owner: OwnerId,
        file_id: FileId,
        recipients: Vec<OwnerId>,
    },
}

/// Fire-and-forget delivery. A failing sink never fails the operation.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &Notification) -> Result<()>;
}
