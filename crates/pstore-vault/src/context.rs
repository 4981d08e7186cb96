//! Shared engine state handed to every service.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use pstore_core::config::{PstoreConfig, SharingConfig};
use pstore_core::{Account, OwnerId, QuotaKind, VaultError, VaultPaths, VaultResult};
use pstore_crypto::{verify_passphrase, KdfParams, KeyParams, MIN_RSA_BITS};
use secrecy::SecretString;
use tracing::warn;

use crate::ledger::JsonLedger;
use crate::notify::TracingNotifier;
use crate::store::{
    AccountStore, FileCatalog, Notification, NotificationSink, ShareLedger, UsageAccountant,
};

/// The collaborators the engine depends on.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub catalog: Arc<dyn FileCatalog>,
    pub shares: Arc<dyn ShareLedger>,
    pub usage: Arc<dyn UsageAccountant>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl Stores {
    /// Every store backed by one ledger, notifications going to the log.
    pub fn from_ledger(ledger: Arc<JsonLedger>) -> Self {
        Stores {
            accounts: ledger.clone(),
            catalog: ledger.clone(),
            shares: ledger.clone(),
            usage: ledger,
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }
}

pub struct VaultContext {
    pub paths: VaultPaths,
    pub kdf: KdfParams,
    pub keys: KeyParams,
    pub sharing: SharingConfig,
    /// Allowance for accounts activated without an explicit quota, in bytes
    pub default_quota_bytes: u64,
    pub stores: Stores,
}

impl VaultContext {
    /// Validate the configuration and create the storage areas.
    pub fn new(config: &PstoreConfig, stores: Stores) -> VaultResult<Self> {
        if config.crypto.rsa_bits < MIN_RSA_BITS {
            return Err(VaultError::Config(format!(
                "crypto.rsa_bits = {} is below the {MIN_RSA_BITS}-bit minimum",
                config.crypto.rsa_bits
            )));
        }
        if config.sharing.default_download_quota == 0 {
            return Err(VaultError::Config(
                "sharing.default_download_quota must be at least 1".into(),
            ));
        }

        let paths = VaultPaths::from_config(&config.storage);
        paths.ensure()?;

        Ok(VaultContext {
            paths,
            kdf: KdfParams::from_config(&config.crypto),
            keys: KeyParams::from_config(&config.crypto),
            sharing: config.sharing.clone(),
            default_quota_bytes: config.quota.default_storage_mb.saturating_mul(1024 * 1024),
            stores,
        })
    }

    /// Unknown owners are indistinguishable from owners without rights.
    pub(crate) fn account(&self, owner: OwnerId) -> VaultResult<Account> {
        self.stores
            .accounts
            .account(owner)?
            .ok_or(VaultError::PermissionDenied)
    }

    /// Check the passphrase against the stored hash before any key material
    /// is touched.
    pub(crate) fn check_passphrase(
        &self,
        account: &Account,
        passphrase: &SecretString,
    ) -> VaultResult<()> {
        if verify_passphrase(passphrase, &account.passphrase_hash)? {
            Ok(())
        } else {
            Err(VaultError::InvalidPassphrase)
        }
    }

    /// Reject `requested` bytes that would take `account` past its allowance.
    ///
    /// This is a point-in-time check against current usage and is not atomic
    /// with the later `insert_file`: concurrent uploads by one owner can each
    /// pass and together exceed the allowance by up to one upload each.
    pub(crate) fn check_storage(&self, account: &Account, requested: u64) -> VaultResult<()> {
        let used = self.stores.usage.usage(account.owner)?;
        if used.saturating_add(requested) > account.storage_quota {
            return Err(VaultError::QuotaExceeded(QuotaKind::Storage {
                used,
                requested,
                allowance: account.storage_quota,
            }));
        }
        Ok(())
    }

    pub(crate) fn notify(&self, event: Notification) {
        if let Err(e) = self.stores.notifier.notify(&event) {
            warn!(?event, "notification failed: {e:#}");
        }
    }
}

/// Write a blob via temp file + rename so readers never see a partial file.
pub(crate) fn write_blob(path: &Path, bytes: &[u8]) -> VaultResult<()> {
    let tmp = path.with_extension("tmp");
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        VaultError::storage_io(path, e)
    })
}

/// Read a blob whose catalog record exists. A missing file is data loss, not
/// an absent record.
pub(crate) fn read_blob(path: &Path, id: &str) -> VaultResult<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => VaultError::FileNotFound(id.to_string()),
        _ => VaultError::storage_io(path, e),
    })
}

/// Delete a blob, treating "already gone" as success.
pub(crate) fn remove_blob(path: &Path) -> VaultResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VaultError::storage_io(path, e)),
    }
}
