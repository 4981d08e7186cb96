//! JSON-backed ledger implementing every metadata store.
//!
//! The ledger file is the source of truth. Every read and every mutation runs
//! under an advisory lock on `<ledger>.lock` (shared for reads, exclusive for
//! mutations) and starts from a fresh read of the file, so several handles,
//! in one process or many, see one consistent history. A mutation is applied
//! to a copy first and flushed atomically via temp+rename; a failed flush
//! leaves both the file and the cached state untouched.
//!
//! The file holds link keys, so it is written owner-only (0600).

use anyhow::{anyhow, bail, Context, Result};
use fs2::FileExt;
use pstore_core::{
    Account, FileId, OwnerId, ShareGrant, ShareLink, ShareStatus, ShareToken, StoredFile,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::store::{AccountStore, FileCatalog, GrantUse, ShareLedger, UsageAccountant};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerState {
    /// owner id → account
    #[serde(default)]
    accounts: HashMap<String, Account>,
    /// file id → stored file
    #[serde(default)]
    files: HashMap<String, StoredFile>,
    /// share token → link
    #[serde(default)]
    links: HashMap<String, ShareLink>,
    #[serde(default)]
    grants: Vec<ShareGrant>,
}

/// What an update did to its copy of the state.
enum Outcome<T> {
    /// Nothing changed; skip the flush.
    Keep(T),
    /// Flush the copy and make it current.
    Commit(T),
}

/// Advisory lock on the ledger's sidecar file, released when the handle closes.
struct FileLock {
    _file: File,
}

pub struct JsonLedger {
    /// `None` keeps everything in memory (tests, dry runs)
    path: Option<PathBuf>,
    /// Last state read from or written to disk
    state: Mutex<LedgerState>,
}

impl JsonLedger {
    pub fn in_memory() -> Self {
        JsonLedger {
            path: None,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Load or create a ledger at the given path.
    /// If the file doesn't exist, starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        let state = load(path)?;
        Ok(JsonLedger {
            path: Some(path.to_path_buf()),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("ledger lock poisoned"))
    }

    /// Take the file lock and reload the cached state from disk.
    fn sync_from_disk(
        &self,
        guard: &mut MutexGuard<'_, LedgerState>,
        exclusive: bool,
    ) -> Result<Option<FileLock>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let lock = lock_file(path, exclusive)?;
        **guard = load(path)?;
        Ok(Some(lock))
    }

    /// Run `f` against the current state.
    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> Result<T> {
        let mut guard = self.lock()?;
        let _file_lock = self.sync_from_disk(&mut guard, false)?;
        Ok(f(&guard))
    }

    /// Run `f` against a copy of the current state; on `Commit` persist the
    /// copy and make it current. Check and write happen under one lock.
    fn update<T>(&self, f: impl FnOnce(&mut LedgerState) -> Result<Outcome<T>>) -> Result<T> {
        let mut guard = self.lock()?;
        let _file_lock = self.sync_from_disk(&mut guard, true)?;

        let mut next = (*guard).clone();
        match f(&mut next)? {
            Outcome::Keep(out) => Ok(out),
            Outcome::Commit(out) => {
                self.flush(&next)?;
                *guard = next;
                Ok(out)
            }
        }
    }

    fn flush(&self, state: &LedgerState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(state).context("serializing ledger")?;

        let tmp_path = path.with_extension("tmp");
        let mut file = owner_only(OpenOptions::new().write(true).create(true).truncate(true))
            .open(&tmp_path)
            .with_context(|| format!("writing ledger temp: {}", tmp_path.display()))?;
        // A temp file left by a crash keeps whatever mode it was created with.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("restricting ledger temp: {}", tmp_path.display()))?;
        }
        file.write_all(json.as_bytes())
            .and_then(|()| file.sync_all())
            .with_context(|| format!("writing ledger temp: {}", tmp_path.display()))?;
        drop(file);

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming ledger: {}", path.display()))?;
        Ok(())
    }
}

fn load(path: &Path) -> Result<LedgerState> {
    if !path.exists() {
        return Ok(LedgerState::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading ledger: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing ledger: {}", path.display()))
}

fn owner_only(opts: &mut OpenOptions) -> &mut OpenOptions {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts
}

fn lock_file(path: &Path, exclusive: bool) -> Result<FileLock> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating ledger dir: {}", parent.display()))?;
    }
    let lock_path = path.with_extension("lock");
    let file = owner_only(OpenOptions::new().read(true).write(true).create(true))
        .open(&lock_path)
        .with_context(|| format!("opening ledger lock: {}", lock_path.display()))?;
    let locked = if exclusive {
        FileExt::lock_exclusive(&file)
    } else {
        FileExt::lock_shared(&file)
    };
    locked.with_context(|| format!("locking ledger: {}", lock_path.display()))?;
    Ok(FileLock { _file: file })
}

impl AccountStore for JsonLedger {
    fn account(&self, owner: OwnerId) -> Result<Option<Account>> {
        self.read(|s| s.accounts.get(&owner.to_string()).cloned())
    }

    fn insert_account(&self, account: Account) -> Result<()> {
        self.update(|s| {
            let key = account.owner.to_string();
            if s.accounts.contains_key(&key) {
                bail!("account {key} already exists");
            }
            s.accounts.insert(key, account);
            Ok(Outcome::Commit(()))
        })
    }
}

impl FileCatalog for JsonLedger {
    fn insert_file(&self, file: StoredFile) -> Result<()> {
        self.update(|s| {
            let key = file.file_id.to_string();
            if s.files.contains_key(&key) {
                bail!("file {key} already recorded");
            }
            s.files.insert(key, file);
            Ok(Outcome::Commit(()))
        })
    }

    fn file(&self, file_id: &FileId) -> Result<Option<StoredFile>> {
        self.read(|s| s.files.get(file_id.as_str()).cloned())
    }

    fn files_of(&self, owner: OwnerId) -> Result<Vec<StoredFile>> {
        let mut files: Vec<StoredFile> = self.read(|s| {
            s.files
                .values()
                .filter(|f| f.owner == owner)
                .cloned()
                .collect()
        })?;
        files.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        Ok(files)
    }

    fn record_download(&self, file_id: &FileId, at: u64) -> Result<Option<u64>> {
        self.update(|s| {
            Ok(match s.files.get_mut(file_id.as_str()) {
                Some(f) => {
                    f.download_count += 1;
                    f.last_accessed = at;
                    Outcome::Commit(Some(f.download_count))
                }
                None => Outcome::Keep(None),
            })
        })
    }

    fn remove_file(&self, file_id: &FileId) -> Result<Option<StoredFile>> {
        self.update(|s| {
            Ok(match s.files.remove(file_id.as_str()) {
                Some(f) => Outcome::Commit(Some(f)),
                None => Outcome::Keep(None),
            })
        })
    }
}

impl ShareLedger for JsonLedger {
    fn insert_link(&self, link: ShareLink, grants: Vec<ShareGrant>) -> Result<()> {
        self.update(|s| {
            let key = link.token.as_str().to_string();
            if s.links.contains_key(&key) {
                bail!("share token collision");
            }
            s.links.insert(key, link);
            s.grants.extend(grants);
            Ok(Outcome::Commit(()))
        })
    }

    fn link(&self, token: &ShareToken) -> Result<Option<ShareLink>> {
        self.read(|s| s.links.get(token.as_str()).cloned())
    }

    fn links(&self) -> Result<Vec<ShareLink>> {
        self.read(|s| s.links.values().cloned().collect())
    }

    fn grant(&self, link_id: &str, recipient: OwnerId) -> Result<Option<ShareGrant>> {
        self.read(|s| {
            s.grants
                .iter()
                .find(|g| g.link_id == link_id && g.recipient == recipient)
                .cloned()
        })
    }

    fn consume_grant(&self, token: &ShareToken, recipient: OwnerId) -> Result<GrantUse> {
        self.update(|s| {
            let Some(link) = s.links.get(token.as_str()) else {
                return Ok(Outcome::Keep(GrantUse::NoGrant));
            };
            if link.is_revoked() {
                return Ok(Outcome::Keep(GrantUse::Revoked));
            }
            let (link_id, quota) = (link.link_id.clone(), link.quota);

            let Some(grant) = s
                .grants
                .iter_mut()
                .find(|g| g.link_id == link_id && g.recipient == recipient)
            else {
                return Ok(Outcome::Keep(GrantUse::NoGrant));
            };
            if grant.download_count >= quota {
                return Ok(Outcome::Keep(GrantUse::Exhausted));
            }
            grant.download_count += 1;
            Ok(Outcome::Commit(GrantUse::Consumed {
                download_count: grant.download_count,
            }))
        })
    }

    fn revoke(&self, token: &ShareToken) -> Result<bool> {
        self.update(|s| {
            Ok(match s.links.get_mut(token.as_str()) {
                Some(link) if !link.is_revoked() => {
                    link.status = ShareStatus::Revoked;
                    Outcome::Commit(true)
                }
                _ => Outcome::Keep(false),
            })
        })
    }
}

impl UsageAccountant for JsonLedger {
    fn usage(&self, owner: OwnerId) -> Result<u64> {
        self.read(|s| {
            s.files
                .values()
                .filter(|f| f.owner == owner)
                .map(|f| f.size)
                .sum()
        })
    }
}
