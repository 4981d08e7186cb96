//! One handle over every engine service.

use std::sync::Arc;

use anyhow::Context;
use pstore_core::config::PstoreConfig;
use pstore_core::paths::expand_tilde;
use pstore_core::VaultResult;

use crate::account::AccountService;
use crate::context::{Stores, VaultContext};
use crate::files::FileService;
use crate::ledger::JsonLedger;
use crate::retrieve::RetrievalPipeline;
use crate::share::ShareEngine;
use crate::upload::UploadPipeline;

pub struct Vault {
    ctx: Arc<VaultContext>,
    pub accounts: AccountService,
    pub uploads: UploadPipeline,
    pub retrievals: RetrievalPipeline,
    pub shares: ShareEngine,
    pub files: FileService,
}

impl Vault {
    pub fn new(config: &PstoreConfig, stores: Stores) -> VaultResult<Self> {
        let ctx = Arc::new(VaultContext::new(config, stores)?);
        Ok(Vault {
            accounts: AccountService::new(ctx.clone()),
            uploads: UploadPipeline::new(ctx.clone()),
            retrievals: RetrievalPipeline::new(ctx.clone()),
            shares: ShareEngine::new(ctx.clone()),
            files: FileService::new(ctx.clone()),
            ctx,
        })
    }

    /// Open the vault described by `config`, backed by its JSON ledger.
    pub fn open(config: &PstoreConfig) -> VaultResult<Self> {
        let ledger_path = expand_tilde(&config.storage.ledger_path());
        let ledger = JsonLedger::open(&ledger_path)
            .with_context(|| format!("opening ledger {}", ledger_path.display()))?;
        Self::new(config, Stores::from_ledger(Arc::new(ledger)))
    }

    pub fn context(&self) -> &VaultContext {
        &self.ctx
    }
}
