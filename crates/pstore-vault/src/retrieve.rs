//! Retrieval pipeline: owner check → passphrase → open → materialize → verify.

use std::sync::Arc;

use pstore_core::{now_unix, FileId, OwnerId, Protection, VaultError, VaultResult};
use pstore_crypto::{load_public_key, open_with_passphrase, verify_file, CryptoError};
use secrecy::SecretString;
use tracing::{error, info, warn};

use crate::context::{read_blob, VaultContext};
use crate::staging::Transfer;

pub struct RetrievalPipeline {
    ctx: Arc<VaultContext>,
}

impl RetrievalPipeline {
    pub fn new(ctx: Arc<VaultContext>) -> Self {
        RetrievalPipeline { ctx }
    }

    /// Materialize the plaintext of `file_id` for `requester`.
    ///
    /// A sealed file needs the owner's passphrase and passes signature
    /// verification before it is handed out; on mismatch the plaintext is
    /// deleted and nothing is returned. The download counter only moves on
    /// success.
    pub fn retrieve(
        &self,
        file_id: &FileId,
        requester: OwnerId,
        passphrase: Option<&SecretString>,
    ) -> VaultResult<Transfer> {
        let ctx = &self.ctx;
        let file = ctx
            .stores
            .catalog
            .file(file_id)?
            .filter(|f| f.owner == requester)
            .ok_or(VaultError::PermissionDenied)?;

        let transfer = match &file.protection {
            Protection::Sealed { signature } => {
                let passphrase = passphrase.ok_or(VaultError::InvalidPassphrase)?;
                let account = ctx.account(file.owner)?;
                ctx.check_passphrase(&account, passphrase)?;

                let blob = read_blob(&file.storage_path, file_id.as_str())?;
                let plaintext =
                    open_with_passphrase(passphrase, &ctx.kdf, &blob).map_err(|e| match e {
                        CryptoError::DecryptionFailed => VaultError::InvalidPassphrase,
                        other => other.into(),
                    })?;

                let transfer = Transfer::materialize(
                    &ctx.paths.transfer,
                    file.file_id.clone(),
                    &file.original_name,
                    &file.mime_type,
                    &plaintext,
                )?;

                let public_key = load_public_key(&account.public_key_pem)?;
                if verify_file(transfer.path(), signature, &public_key).is_err() {
                    error!(
                        security_event = true,
                        owner = %file.owner,
                        %file_id,
                        "signature mismatch on retrieval: unauthorized file alteration detected"
                    );
                    return Err(VaultError::SignatureMismatch);
                }
                transfer
            }
            Protection::Plain => {
                let plaintext = read_blob(&file.storage_path, file_id.as_str())?;
                Transfer::materialize(
                    &ctx.paths.transfer,
                    file.file_id.clone(),
                    &file.original_name,
                    &file.mime_type,
                    &plaintext,
                )?
            }
        };

        match ctx.stores.catalog.record_download(file_id, now_unix())? {
            Some(count) => {
                info!(owner = %requester, %file_id, downloads = count, "file retrieved");
            }
            None => {
                warn!(%file_id, "file record vanished during retrieval");
                return Err(VaultError::PermissionDenied);
            }
        }
        Ok(transfer)
    }
}
