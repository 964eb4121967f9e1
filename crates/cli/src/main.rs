//! rescache entry point.
//!
//! Loads URLs through one in-memory registry and prints JSON reports on stdout.
//! Logging goes to stderr so the reports can be piped.

use anyhow::Result;
use clap::Parser;
use rescache_client::fetch::canonicalize;
use rescache_client::{FetchClient, FetchConfig};
use rescache_core::{CacheConfig, Registry, ReloadMode};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;
mod report;

use cli::{Cli, Command};
use report::FetchReport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = CacheConfig::load()?;

    match cli.command {
        Command::Config => print_json(&config)?,
        Command::Fetch { urls, mode, clear } => {
            let mode = mode.unwrap_or(config.default_mode);
            fetch_all(config, &urls, mode, clear).await?;
        }
    }

    Ok(())
}

async fn fetch_all(config: CacheConfig, urls: &[String], mode: ReloadMode, clear: bool) -> Result<()> {
    let client = FetchClient::new(FetchConfig::from(&config))?;
    let mut registry = Registry::new(config);

    tracing::info!(count = urls.len(), %mode, "loading urls");

    for input in urls {
        let report = match canonicalize(input) {
            Err(e) => FetchReport::failed(input, e),
            Ok(url) => match client.load(&mut registry, &url, mode).await {
                Ok(id) => FetchReport::for_entry(&mut registry, input, id),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "load failed");
                    FetchReport::failed(input, e)
                }
            },
        };
        print_json(&report)?;
    }

    if clear {
        let gc = registry.garbage_collection(true);
        tracing::info!(freed = gc.freed_entries, bytes = gc.freed_bytes, "cleared cache");
    }

    print_json(&registry.stats())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
