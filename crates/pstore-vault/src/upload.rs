//! Upload pipeline: scratch → sign → seal → blob → catalog record.

use std::fs::{self, File};
use std::io::{self, Read};
use std::sync::Arc;

use pstore_core::{now_unix, FileId, OwnerId, Protection, StoredFile, VaultError, VaultResult};
use pstore_crypto::{load_private_key, seal_with_passphrase, sign_file, sniff_mime};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::context::{remove_blob, write_blob, VaultContext};
use crate::staging::{sanitize_name, ScopedDir};
use crate::store::Notification;

/// How the stored copy is protected.
pub enum UploadMode {
    /// Signed with the owner's private key, then sealed under the passphrase.
    Sealed { passphrase: SecretString },
    /// Stored as plaintext with no signature.
    Plain,
}

impl std::fmt::Debug for UploadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadMode::Sealed { .. } => f.write_str("Sealed"),
            UploadMode::Plain => f.write_str("Plain"),
        }
    }
}

#[derive(Debug)]
pub struct UploadRequest {
    pub owner: OwnerId,
    pub original_name: String,
    /// Size the caller announced; checked against the allowance before any I/O.
    pub declared_size: u64,
    pub mode: UploadMode,
}

pub struct UploadPipeline {
    ctx: Arc<VaultContext>,
}

impl UploadPipeline {
    pub fn new(ctx: Arc<VaultContext>) -> Self {
        UploadPipeline { ctx }
    }

    /// Store everything `reader` yields.
    ///
    /// The catalog record is written last; on any earlier failure no record
    /// exists, the blob (if written) is removed and the scratch area is
    /// cleaned up.
    pub fn upload<R: Read>(&self, req: UploadRequest, reader: &mut R) -> VaultResult<StoredFile> {
        let ctx = &self.ctx;
        let account = ctx.account(req.owner)?;
        ctx.check_storage(&account, req.declared_size)?;
        if let UploadMode::Sealed { passphrase } = &req.mode {
            ctx.check_passphrase(&account, passphrase)?;
        }

        let scratch = ScopedDir::create(&ctx.paths.scratch)?;
        let scratch_file = scratch.path().join(sanitize_name(&req.original_name));
        let size = {
            let mut out =
                File::create(&scratch_file).map_err(|e| VaultError::storage_io(&scratch_file, e))?;
            io::copy(reader, &mut out).map_err(|e| VaultError::storage_io(&scratch_file, e))?
        };
        if size != req.declared_size {
            debug!(declared = req.declared_size, actual = size, "upload size differs from declared size");
        }
        ctx.check_storage(&account, size)?;

        let plaintext =
            fs::read(&scratch_file).map_err(|e| VaultError::storage_io(&scratch_file, e))?;
        let mime_type = sniff_mime(&plaintext);

        let (blob, protection) = match &req.mode {
            UploadMode::Sealed { passphrase } => {
                let private_key =
                    load_private_key(passphrase, &ctx.kdf, &account.private_key_path)?;
                let signature = sign_file(&scratch_file, &private_key)?;
                let blob = seal_with_passphrase(passphrase, &ctx.kdf, &plaintext)?;
                (blob, Protection::Sealed { signature })
            }
            UploadMode::Plain => (plaintext, Protection::Plain),
        };

        let file_id = FileId::generate();
        let storage_path = ctx.paths.file_blob(&file_id);
        write_blob(&storage_path, &blob)?;

        let now = now_unix();
        let record = StoredFile {
            file_id: file_id.clone(),
            owner: req.owner,
            original_name: req.original_name.clone(),
            size,
            mime_type,
            storage_path: storage_path.clone(),
            protection,
            created_at: now,
            last_accessed: now,
            download_count: 0,
        };

        if let Err(e) = ctx.stores.catalog.insert_file(record.clone()) {
            if let Err(cleanup) = remove_blob(&storage_path) {
                warn!(%file_id, "failed to remove orphaned blob: {cleanup}");
            }
            return Err(e.into());
        }
        drop(scratch);

        info!(
            owner = %req.owner,
            %file_id,
            size,
            sealed = record.protection.is_sealed(),
            "file stored"
        );
        ctx.notify(Notification::FileUploaded {
            owner: req.owner,
            file_id,
            original_name: req.original_name,
            size,
        });
        Ok(record)
    }
}
