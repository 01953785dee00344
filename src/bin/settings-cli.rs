use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use settings_store::config::loader::load_config;
use settings_store::config::watcher::StoreWatcher;
use settings_store::config::StoreConfig;
use settings_store::observability;
use settings_store::storage::kv::{namespaced_key, FileStore, KeyValueStore, Namespaced};
use settings_store::storage::recovery::{get_recovery, set_recovery, RecoveryLog};
use settings_store::storage::StorageDocument;

#[derive(Parser)]
#[command(name = "settings-cli")]
#[command(about = "Inspect and repair file-backed settings documents", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store file, overriding `storage.path`.
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Manager prefix, overriding `storage.prefix`.
    #[arg(short, long)]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the settings slot of this prefix
    Show,
    /// Inspect or edit the recovery log of this prefix
    Recovery {
        #[command(subcommand)]
        action: RecoveryAction,
    },
    /// Print the settings slot whenever the store file changes
    Watch,
}

#[derive(Subcommand)]
enum RecoveryAction {
    /// List recovery entries
    List,
    /// Remove every recovery entry of this prefix
    Clear,
    /// Put a recovered payload back into the settings slot
    Restore {
        /// Timestamp of the entry (as shown by `list`)
        timestamp: String,
    },
}

struct Target {
    store: Namespaced<FileStore>,
    key: String,
    prefix: String,
}

impl Target {
    fn document(&self) -> Result<StorageDocument, Box<dyn std::error::Error>> {
        Ok(match self.store.get(&self.key)? {
            Some(text) => serde_json::from_str(&text)?,
            None => StorageDocument::default(),
        })
    }

    fn save(&self, document: &StorageDocument) -> Result<(), Box<dyn std::error::Error>> {
        self.store.set(&self.key, serde_json::to_string(document)?)?;
        Ok(())
    }

    fn slot(&self) -> Result<Value, Box<dyn std::error::Error>> {
        Ok(self
            .document()?
            .settings
            .remove(&self.prefix)
            .unwrap_or(Value::Null))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => StoreConfig::default(),
    };
    observability::init(&config.observability);

    let path = cli
        .store
        .clone()
        .or_else(|| config.storage.path.clone().map(PathBuf::from))
        .ok_or("no store file given (use --store or storage.path)")?;
    let target = Target {
        store: Namespaced::new(config.storage.namespace.clone(), FileStore::new(&path)),
        key: config.storage.key.clone(),
        prefix: cli.prefix.clone().unwrap_or_else(|| config.storage.prefix.clone()),
    };
    tracing::debug!(
        path = %path.display(),
        key = %namespaced_key(&config.storage.namespace, &target.key),
        prefix = %target.prefix,
        "Using store"
    );

    match cli.command {
        Commands::Show => {
            println!("{}", serde_json::to_string_pretty(&target.slot()?)?);
        }
        Commands::Recovery { action } => match action {
            RecoveryAction::List => {
                let entries = get_recovery(&target.document()?.recovery, &target.prefix);
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
            RecoveryAction::Clear => {
                let mut document = target.document()?;
                document.recovery = set_recovery(&document.recovery, &target.prefix, &RecoveryLog::new());
                target.save(&document)?;
                println!("Recovery log cleared for '{}'", target.prefix);
            }
            RecoveryAction::Restore { timestamp } => {
                let mut document = target.document()?;
                let mut entries = get_recovery(&document.recovery, &target.prefix);
                let text = entries
                    .remove(&timestamp)
                    .ok_or_else(|| format!("no recovery entry '{timestamp}'"))?;
                let restored: Value = serde_json::from_str(&text)?;
                document.settings.insert(target.prefix.clone(), restored);
                document.recovery = set_recovery(&document.recovery, &target.prefix, &entries);
                target.save(&document)?;
                println!("Restored '{timestamp}' into '{}'", target.prefix);
            }
        },
        Commands::Watch => {
            let (watcher, mut changes) = StoreWatcher::new(&path);
            let _guard = watcher.run()?;
            println!("{}", serde_json::to_string_pretty(&target.slot()?)?);
            while changes.recv().await.is_some() {
                match target.slot() {
                    Ok(slot) => println!("{}", serde_json::to_string_pretty(&slot)?),
                    Err(e) => tracing::error!(error = %e, "Failed to read store"),
                }
            }
        }
    }

    Ok(())
}
