//! Lyceum Storage Inspector
//!
//! Opens the platform vault, reports what is inside, and restores the
//! persisted session if one exists.
//!
//! ## Usage
//!
//! ```bash
//! # Inspect the default vault
//! lyceum-storage
//!
//! # Inspect a specific data directory
//! lyceum-storage --data-dir /srv/lyceum
//!
//! # Start with custom config
//! lyceum-storage --config /path/to/config.toml
//!
//! # Skip the simulated network pacing
//! lyceum-storage --no-latency
//! ```

use clap::Parser;
use lyceum_storage::session::SHARED_NAMESPACE;
use lyceum_storage::{Config, LoginRateLimiter, SessionManager, SimilarityEngine, Vault};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lyceum-storage")]
#[command(about = "Persistence core for the Lyceum academic capsule platform")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(long, env = "LYCEUM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Disable simulated network latency
    #[arg(long)]
    no_latency: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("lyceum_storage=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if args.no_latency {
        config.simulate_latency = false;
    }

    info!(
        data_dir = %config.data_dir.display(),
        simulate_latency = config.simulate_latency,
        "Starting lyceum-storage"
    );

    // Ensure data directory exists
    tokio::fs::create_dir_all(&config.data_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let vault = Arc::new(Vault::open(config.vault_db_path())?);
    let limiter = Arc::new(LoginRateLimiter::new(
        config.lockout_threshold,
        config.lockout_window(),
    ));
    let sessions = SessionManager::new(vault.clone(), limiter, &config);
    let engine = SimilarityEngine::new(vault.clone());

    match sessions.restore_session() {
        Some(session) => info!(
            principal = %session.principal.email,
            role = ?session.principal.role,
            namespace = %session.namespace,
            "Restored persisted session"
        ),
        None => info!("No persisted session"),
    }

    let stats = vault.stats()?;
    info!(
        keys = stats.total_keys,
        size_on_disk_bytes = stats.size_on_disk_bytes,
        principals = sessions.registered_count(),
        fingerprints = engine.history_len(),
        "Vault contents"
    );

    // Per-collection entry counts, owner namespaces then the shared mirror
    let mut collection_keys = vault.keys_with_prefix("user_")?;
    collection_keys.extend(vault.keys_with_prefix(SHARED_NAMESPACE)?);
    for key in collection_keys {
        if let Ok(Some(raw)) = vault.get(&key) {
            if let Ok(serde_json::Value::Array(entries)) = serde_json::from_str(&raw) {
                info!(key = %key, entries = entries.len(), "Collection");
            }
        }
    }

    vault.flush()?;
    Ok(())
}
