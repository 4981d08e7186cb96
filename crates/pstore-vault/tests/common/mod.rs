//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use pstore_core::config::PstoreConfig;
use pstore_core::{Account, OwnerId};
use pstore_vault::{JsonLedger, Notification, NotificationSink, Stores, Vault};
use rsa::RsaPrivateKey;
use secrecy::SecretString;
use tempfile::TempDir;

pub const OWNER: OwnerId = OwnerId(1);
pub const RECIPIENT: OwnerId = OwnerId(2);
pub const STRANGER: OwnerId = OwnerId(3);

/// RSA-4096 generation is slow; every test in a binary reuses this key.
pub fn shared_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 4096).expect("rsa keygen"))
}

pub fn pass(s: &str) -> SecretString {
    SecretString::from(s)
}

/// Defaults rooted at `root`, with cheap Argon2 parameters.
pub fn test_config(root: &Path) -> PstoreConfig {
    let mut cfg = PstoreConfig::default();
    cfg.storage.root = root.to_path_buf();
    cfg.crypto.argon2_mem_cost_kib = 1024;
    cfg.crypto.argon2_time_cost = 1;
    cfg.crypto.argon2_parallelism = 1;
    cfg
}

pub struct Harness {
    pub tmp: TempDir,
    pub config: PstoreConfig,
    pub ledger: Arc<JsonLedger>,
    pub vault: Vault,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_stores(Stores::from_ledger)
    }

    pub fn with_stores(build: impl FnOnce(Arc<JsonLedger>) -> Stores) -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let config = test_config(tmp.path());
        let ledger = Arc::new(
            JsonLedger::open(&tmp.path().join("ledger.json")).expect("open ledger"),
        );
        let vault = Vault::new(&config, build(ledger.clone())).expect("vault");
        Harness {
            tmp,
            config,
            ledger,
            vault,
        }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn area(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }

    /// Number of entries directly inside a storage area.
    pub fn entries_in(&self, name: &str) -> usize {
        std::fs::read_dir(self.area(name))
            .map(|d| d.count())
            .unwrap_or(0)
    }

    pub fn activate(&self, owner: OwnerId, passphrase: &str) -> Account {
        self.vault
            .accounts
            .activate_with_key(owner, &pass(passphrase), shared_key(), None)
            .expect("activate")
    }

    pub fn activate_with_quota(&self, owner: OwnerId, passphrase: &str, quota: u64) -> Account {
        self.vault
            .accounts
            .activate_with_key(owner, &pass(passphrase), shared_key(), Some(quota))
            .expect("activate")
    }
}

/// Deterministic, non-repeating test payload.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8)
        .collect()
}

/// Records every notification it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<Notification>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &Notification) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Always fails.
pub struct BrokenSink;

impl NotificationSink for BrokenSink {
    fn notify(&self, _event: &Notification) -> anyhow::Result<()> {
        anyhow::bail!("mail relay unreachable")
    }
}
