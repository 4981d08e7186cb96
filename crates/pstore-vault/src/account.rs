//! Account activation: passphrase hash, sealed key pair, storage allowance.

use std::sync::Arc;

use anyhow::anyhow;
use pstore_core::{now_unix, Account, OwnerId, VaultError, VaultResult};
use pstore_crypto::{generate_key_pair, hash_passphrase, load_public_key, seal_key_pair, KeyPairRef};
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::context::{remove_blob, VaultContext};

pub struct AccountService {
    ctx: Arc<VaultContext>,
}

impl AccountService {
    pub fn new(ctx: Arc<VaultContext>) -> Self {
        AccountService { ctx }
    }

    /// Activate `owner` with a freshly generated key pair.
    ///
    /// `storage_quota` is in bytes; `None` applies the configured default.
    pub fn activate(
        &self,
        owner: OwnerId,
        passphrase: &SecretString,
        storage_quota: Option<u64>,
    ) -> VaultResult<Account> {
        self.ensure_inactive(owner)?;
        let passphrase_hash = hash_passphrase(passphrase, &self.ctx.kdf)?;
        let key_pair = generate_key_pair(
            passphrase,
            &self.ctx.kdf,
            &self.ctx.keys,
            &self.ctx.paths.keys,
        )?;
        self.commit(owner, passphrase_hash, key_pair, storage_quota)
    }

    /// Activate `owner` with an existing private key, sealed under `passphrase`.
    pub fn activate_with_key(
        &self,
        owner: OwnerId,
        passphrase: &SecretString,
        private_key: &RsaPrivateKey,
        storage_quota: Option<u64>,
    ) -> VaultResult<Account> {
        self.ensure_inactive(owner)?;
        let passphrase_hash = hash_passphrase(passphrase, &self.ctx.kdf)?;
        let key_pair = seal_key_pair(private_key, passphrase, &self.ctx.kdf, &self.ctx.paths.keys)?;
        self.commit(owner, passphrase_hash, key_pair, storage_quota)
    }

    /// Check `passphrase` against the stored hash.
    pub fn authenticate(&self, owner: OwnerId, passphrase: &SecretString) -> VaultResult<Account> {
        let account = self.ctx.account(owner)?;
        self.ctx.check_passphrase(&account, passphrase)?;
        Ok(account)
    }

    pub fn public_key(&self, owner: OwnerId) -> VaultResult<RsaPublicKey> {
        let account = self.ctx.account(owner)?;
        Ok(load_public_key(&account.public_key_pem)?)
    }

    fn ensure_inactive(&self, owner: OwnerId) -> VaultResult<()> {
        if self.ctx.stores.accounts.account(owner)?.is_some() {
            return Err(VaultError::Store(anyhow!(
                "account {owner} is already activated"
            )));
        }
        Ok(())
    }

    /// Record the account. On failure the sealed key is removed so no partial
    /// account state remains.
    fn commit(
        &self,
        owner: OwnerId,
        passphrase_hash: String,
        key_pair: KeyPairRef,
        storage_quota: Option<u64>,
    ) -> VaultResult<Account> {
        let account = Account {
            owner,
            passphrase_hash,
            public_key_pem: key_pair.public_key_pem,
            private_key_path: key_pair.private_key_path,
            storage_quota: storage_quota.unwrap_or(self.ctx.default_quota_bytes),
            created_at: now_unix(),
        };

        if let Err(e) = self.ctx.stores.accounts.insert_account(account.clone()) {
            if let Err(cleanup) = remove_blob(&account.private_key_path) {
                warn!(%owner, "failed to remove sealed key after aborted activation: {cleanup}");
            }
            return Err(e.into());
        }

        info!(%owner, quota = account.storage_quota, "account activated");
        Ok(account)
    }
}
