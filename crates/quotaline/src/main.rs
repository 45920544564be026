//! # quotaline - Claude Code status line
//!
//! Reads the session JSON Claude Code pipes to its status line command, looks
//! up plan usage (cached on disk, refreshed from the OAuth usage API), and
//! prints one line with token counts and colored quota bars.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::warn;

mod activity;
mod cache;
mod config;
mod credentials;
mod error;
mod fetcher;
mod input;
mod logging;
mod render;
mod statusline;
mod store;

use activity::{ActivitySignal, HistoryFile, NoActivity};
use cache::{FreshnessPolicy, UsageCache};
use config::Config;
use credentials::ChainedTokenSource;
use fetcher::{ReqwestTransport, UsageFetcher};
use store::{migrate_legacy_cache, SnapshotStore};

#[derive(Parser)]
#[command(name = "quotaline")]
#[command(about = "Claude Code status line with token counts and usage quotas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/quotaline/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Usage cache file (default: <config dir>/quotaline/cache.json)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Usage API endpoint
    #[arg(long)]
    endpoint: Option<String>,
}

fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        warn!("failed to load config: {}", e);
        Config::default()
    })
}

/// An unresolvable location becomes an empty path: reads and writes on it fail
/// and are handled like any other cache or credentials I/O error.
fn path_or_warn(path: error::Result<PathBuf>, what: &str) -> PathBuf {
    path.unwrap_or_else(|e| {
        warn!("could not determine {} location: {}", what, e);
        PathBuf::new()
    })
}

/// An explicit cache file is used as given. Otherwise the default location is
/// used, after moving a cache left at `legacy` by older releases into it.
fn resolve_cache_path(
    explicit: Option<PathBuf>,
    default: error::Result<PathBuf>,
    legacy: error::Result<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    let path = path_or_warn(default, "cache");
    if let Ok(legacy) = legacy {
        if let Err(e) = migrate_legacy_cache(&legacy, &path) {
            warn!("failed to migrate cache: {}", e);
        }
    }
    path
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    let cache_path = resolve_cache_path(
        cli.cache_file,
        config::cache_path(),
        config::legacy_cache_path(),
    );
    let endpoint = cli.endpoint.unwrap_or_else(|| config.api.endpoint.clone());

    let activity: Box<dyn ActivitySignal> = match config::history_path() {
        Ok(path) => Box::new(HistoryFile::new(path)),
        Err(_) => Box::new(NoActivity),
    };
    let credentials_path = path_or_warn(config::credentials_path(), "credentials");

    let fetcher = UsageFetcher::new(
        ReqwestTransport::new(config.api.timeout()),
        ChainedTokenSource::platform_default(credentials_path),
        endpoint,
    );
    let cache = UsageCache::new(
        SnapshotStore::new(cache_path),
        fetcher,
        activity,
        FreshnessPolicy::from(&config.cache),
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    statusline::run(
        stdin.lock(),
        stdout.lock(),
        &config.display,
        &cache,
        Utc::now(),
    )
    .await?;

    Ok(())
}
