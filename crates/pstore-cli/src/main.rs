//! pstore: peerstore command-line interface
//!
//! Account:
//!   account create                 - hash passphrase, generate and seal an RSA key pair
//!
//! Files:
//!   upload <path> [--plain]        - sign + seal (or store as-is) a local file
//!   download <file-id> [--out]     - open, verify and write out a stored file
//!   ls                             - list stored files and usage
//!   rm <file-id>                   - delete a stored file and its blob
//!
//! Sharing:
//!   share <file-id> --to <id>...   - create a link-key copy for recipients
//!   fetch <token> [--out]          - download through a share link
//!   revoke <token>                 - revoke a link and delete its copy
//!   links                          - list links created by the owner
//!   sweep                          - reclaim blobs of expired or revoked links
//!
//!   config show                    - display current configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pstore_core::config::{LogConfig, PstoreConfig};
use pstore_core::{now_unix, FileId, OwnerId, ShareToken};
use pstore_vault::{ShareRequest, Transfer, UploadMode, UploadRequest, Vault};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Environment variable consulted before prompting for a passphrase.
const PASSPHRASE_ENV: &str = "PSTORE_PASSPHRASE";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pstore",
    version,
    about = "peerstore: passphrase-sealed, signed file storage",
    long_about = "pstore: store files sealed under your passphrase, verify them on retrieval, \
                  and share them through expiring, quota-limited links"
)]
struct Cli {
    /// Path to pstore.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "PSTORE_CONFIG",
        default_value = "~/.config/pstore/config.toml"
    )]
    config: PathBuf,

    /// Acting account id
    #[arg(long, short = 'u', env = "PSTORE_OWNER", global = true)]
    owner: Option<u64>,

    /// Log level (trace, debug, info, warn, error); overrides `[log] level`
    #[arg(long, env = "PSTORE_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides `[log] format`
    #[arg(long, env = "PSTORE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Account management
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Store a local file
    Upload {
        /// Local file to upload
        path: PathBuf,
        /// Name to record (default: the file's own name)
        #[arg(long)]
        name: Option<String>,
        /// Store without signing or sealing
        #[arg(long)]
        plain: bool,
    },

    /// Retrieve a stored file
    Download {
        file_id: String,
        /// Destination (default: original name in the current directory)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// List stored files
    Ls,

    /// Delete a stored file
    Rm { file_id: String },

    /// Create a share link for a stored file
    Share {
        file_id: String,
        /// Recipient account ids
        #[arg(long = "to", required = true, num_args = 1..)]
        recipients: Vec<u64>,
        /// Link lifetime in seconds
        #[arg(long, default_value_t = 24 * 3600)]
        expires_in: u64,
        /// Downloads allowed per recipient (default from config)
        #[arg(long)]
        quota: Option<u32>,
        #[arg(long)]
        note: Option<String>,
    },

    /// Download through a share link
    Fetch {
        token: String,
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Revoke a share link
    Revoke { token: String },

    /// List share links created by the acting account
    Links,

    /// Delete blobs of expired or revoked share links
    Sweep,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum AccountAction {
    /// Activate the acting account
    Create {
        /// Storage allowance in MiB (default from config)
        #[arg(long)]
        quota_mb: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = pstore_core::paths::expand_tilde(&cli.config);
    let config = load_config(&config_path).await?;

    let (level, format) = log_settings(cli.log.as_deref(), cli.log_format.as_ref(), &config.log);
    init_logging(&level, &format);
    if !config_path.exists() {
        warn!("config file not found: {}  (using defaults)", config_path.display());
    }

    if let Commands::Config {
        action: ConfigAction::Show,
    } = &cli.command
    {
        return cmd_config_show(&config, &config_path);
    }

    let vault = Arc::new(Vault::open(&config).context("opening vault")?);
    let owner = cli.owner.map(OwnerId);

    match cli.command {
        Commands::Account {
            action: AccountAction::Create { quota_mb },
        } => cmd_account_create(vault, require_owner(owner)?, quota_mb).await,
        Commands::Upload { path, name, plain } => {
            cmd_upload(vault, require_owner(owner)?, path, name, plain).await
        }
        Commands::Download { file_id, out } => {
            cmd_download(vault, require_owner(owner)?, FileId::from(file_id), out).await
        }
        Commands::Ls => cmd_ls(vault, require_owner(owner)?).await,
        Commands::Rm { file_id } => {
            let owner = require_owner(owner)?;
            let id = FileId::from(file_id);
            blocking(move || Ok(vault.files.delete(&id, owner)?)).await?;
            println!("deleted");
            Ok(())
        }
        Commands::Share {
            file_id,
            recipients,
            expires_in,
            quota,
            note,
        } => {
            let req = ShareRequest {
                file_id: FileId::from(file_id),
                owner: require_owner(owner)?,
                recipients: recipients.into_iter().map(OwnerId).collect(),
                expires_at: now_unix().saturating_add(expires_in),
                quota,
                note,
            };
            cmd_share(vault, req).await
        }
        Commands::Fetch { token, out } => {
            cmd_fetch(vault, require_owner(owner)?, ShareToken::from(token), out).await
        }
        Commands::Revoke { token } => {
            let owner = require_owner(owner)?;
            let token = ShareToken::from(token);
            blocking(move || Ok(vault.shares.revoke_link(&token, owner)?)).await?;
            println!("revoked");
            Ok(())
        }
        Commands::Links => cmd_links(vault, require_owner(owner)?).await,
        Commands::Sweep => {
            let removed = blocking(move || Ok(vault.shares.purge_expired()?)).await?;
            println!("reclaimed {removed} share blob(s)");
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn load_config(path: &Path) -> Result<PstoreConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(PstoreConfig::default())
    }
}

/// Command-line flags win over the `[log]` section.
fn log_settings(
    level: Option<&str>,
    format: Option<&LogFormat>,
    config: &LogConfig,
) -> (String, LogFormat) {
    let level = level.unwrap_or(config.level.as_str()).to_string();
    let format = match format {
        Some(f) => f.clone(),
        None => LogFormat::from_str(&config.format, true).unwrap_or(LogFormat::Text),
    };
    (level, format)
}

fn require_owner(owner: Option<OwnerId>) -> Result<OwnerId> {
    owner.context("no acting account: pass --owner or set PSTORE_OWNER")
}

/// Run engine work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("engine task failed")?
}

fn read_passphrase(confirm: bool) -> Result<SecretString> {
    if let Ok(from_env) = std::env::var(PASSPHRASE_ENV) {
        return Ok(SecretString::from(from_env));
    }

    let first = Zeroizing::new(
        rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
    );
    if first.is_empty() {
        bail!("empty passphrase refused");
    }
    if confirm {
        let second = Zeroizing::new(
            rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?,
        );
        if *first != *second {
            bail!("passphrases did not match");
        }
    }
    Ok(SecretString::from(first.to_string()))
}

/// Copy a materialized transfer to `out`, then remove the plaintext copy.
fn deliver(transfer: Transfer, out: Option<PathBuf>) -> Result<PathBuf> {
    let dest = out
        .unwrap_or_else(|| PathBuf::from(transfer.path().file_name().unwrap_or_default()));
    let copied = std::fs::copy(transfer.path(), &dest)
        .with_context(|| format!("writing {}", dest.display()));
    // Removed whether or not the copy succeeded.
    transfer.finish().context("removing transfer copy")?;
    copied?;
    Ok(dest)
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn cmd_account_create(vault: Arc<Vault>, owner: OwnerId, quota_mb: Option<u64>) -> Result<()> {
    let passphrase = read_passphrase(true)?;
    println!("Generating RSA key pair (this can take a while)...");
    let account = blocking(move || {
        let quota = quota_mb.map(|mb| mb.saturating_mul(1024 * 1024));
        Ok(vault.accounts.activate(owner, &passphrase, quota)?)
    })
    .await?;

    info!(%owner, "account created");
    println!("Account {} activated", account.owner);
    println!("  sealed key: {}", account.private_key_path.display());
    println!("  quota:      {} bytes", account.storage_quota);
    println!();
    print!("{}", account.public_key_pem);
    Ok(())
}

async fn cmd_upload(
    vault: Arc<Vault>,
    owner: OwnerId,
    path: PathBuf,
    name: Option<String>,
    plain: bool,
) -> Result<()> {
    let original_name = match name {
        Some(n) => n,
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("no file name in {}", path.display()))?,
    };
    let mode = if plain {
        UploadMode::Plain
    } else {
        UploadMode::Sealed {
            passphrase: read_passphrase(false)?,
        }
    };

    let stored = blocking(move || {
        let mut file =
            std::fs::File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let declared_size = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        let req = UploadRequest {
            owner,
            original_name,
            declared_size,
            mode,
        };
        Ok(vault.uploads.upload(req, &mut file)?)
    })
    .await?;

    println!("{}", stored.file_id);
    Ok(())
}

async fn cmd_download(
    vault: Arc<Vault>,
    owner: OwnerId,
    file_id: FileId,
    out: Option<PathBuf>,
) -> Result<()> {
    // Plain files need no passphrase; only prompt when the record says so.
    let needs_passphrase = {
        let vault = vault.clone();
        let id = file_id.clone();
        blocking(move || {
            Ok(vault
                .files
                .list(owner)?
                .iter()
                .any(|f| f.file_id == id && f.protection.is_sealed()))
        })
        .await?
    };
    let passphrase = if needs_passphrase {
        Some(read_passphrase(false)?)
    } else {
        None
    };

    let dest = blocking(move || {
        let transfer = vault
            .retrievals
            .retrieve(&file_id, owner, passphrase.as_ref())?;
        deliver(transfer, out)
    })
    .await?;

    println!("{}", dest.display());
    Ok(())
}

async fn cmd_ls(vault: Arc<Vault>, owner: OwnerId) -> Result<()> {
    let (files, usage) = blocking(move || {
        Ok((vault.files.list(owner)?, vault.files.usage(owner)?))
    })
    .await?;

    for f in &files {
        println!(
            "{}  {:>10}  {:<6}  {:<28}  {}",
            f.file_id,
            f.size,
            if f.protection.is_sealed() { "sealed" } else { "plain" },
            f.mime_type,
            f.original_name
        );
    }
    println!("{} file(s), {} bytes used", files.len(), usage);
    Ok(())
}

async fn cmd_share(vault: Arc<Vault>, req: ShareRequest) -> Result<()> {
    let passphrase = read_passphrase(false)?;
    let link = blocking(move || Ok(vault.shares.create_link(req, &passphrase)?)).await?;

    println!("{}", link.token);
    println!("  expires at: {} (unix)", link.expires_at);
    println!("  quota:      {} per recipient", link.quota);
    Ok(())
}

async fn cmd_fetch(
    vault: Arc<Vault>,
    recipient: OwnerId,
    token: ShareToken,
    out: Option<PathBuf>,
) -> Result<()> {
    let dest = blocking(move || {
        let transfer = vault.shares.access_link(&token, recipient)?;
        deliver(transfer, out)
    })
    .await?;

    println!("{}", dest.display());
    Ok(())
}

async fn cmd_links(vault: Arc<Vault>, owner: OwnerId) -> Result<()> {
    let links = blocking(move || Ok(vault.shares.links_of(owner)?)).await?;
    let now = now_unix();
    for link in &links {
        let state = if link.is_revoked() {
            "revoked"
        } else if link.is_expired(now) {
            "expired"
        } else {
            "shared"
        };
        println!(
            "{}  {:<7}  quota {:>3}  {}  {}",
            link.token,
            state,
            link.quota,
            link.file_id,
            link.note.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn cmd_config_show(config: &PstoreConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
