//! Google Sheets reader
//!
//! Single-binary CLI that:
//! 1. Loads `sheet-reader.toml` and seeds OAuth client secrets from a dotenv file
//! 2. Obtains Google credentials (stored, refreshed, or via browser consent)
//! 3. Reads the configured range and prints one tab-separated line per row
//!
//! `sheet-reader status` only reports on the stored token, with no network.

mod config;
mod error;
mod sheets;

use std::sync::Arc;

use anyhow::{Context, Result};
use google_auth::{
    BrowserNotifier, ClientConfig, CredentialManager, GoogleTokenClient, LogNotifier, Notifier,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, load_env_file};
use crate::sheets::{SheetsClient, format_rows};

/// What the invocation asks for
#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Authenticate and print the configured range
    Read,
    /// Report on the stored token only
    Status,
}

/// Parsed command line
#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config: Option<String>,
    no_browser: bool,
    command: Command,
}

impl Cli {
    /// `sheet-reader [--config PATH] [--no-browser] [status]`
    fn parse(args: &[String]) -> Result<Self> {
        let mut cli = Cli {
            config: None,
            no_browser: false,
            command: Command::Read,
        };
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    let path = iter.next().context("--config requires a path")?;
                    cli.config = Some(path.clone());
                }
                "--no-browser" => cli.no_browser = true,
                "status" => cli.command = Command::Status,
                other => anyhow::bail!(
                    "unexpected argument {other:?}; usage: sheet-reader [--config PATH] [--no-browser] [status]"
                ),
            }
        }
        Ok(cli)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only sheet rows
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = Cli::parse(&args)?;

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    match load_env_file(&config.auth.env_file) {
        Ok(true) => info!(path = %config.auth.env_file.display(), "loaded env file"),
        Ok(false) => debug!(path = %config.auth.env_file.display(), "no env file"),
        Err(e) => warn!(error = %e, "ignoring env file"),
    }

    let store = config.token_store();
    info!(path = %store.path().display(), "token store");

    if cli.command == Command::Status {
        let status = store.status().await;
        println!("{}: {status}", store.path().display());
        if status.needs_auth() {
            println!("run `sheet-reader` without arguments to authorize");
        }
        return Ok(());
    }

    let client_config = ClientConfig::from_env().context("OAuth client is not configured")?;
    let notifier: Arc<dyn Notifier> = if cli.no_browser {
        Arc::new(LogNotifier)
    } else {
        Arc::new(BrowserNotifier)
    };
    let http = reqwest::Client::new();
    let endpoint = Arc::new(GoogleTokenClient::new(http.clone(), &client_config));
    let manager = CredentialManager::with_parts(client_config, store, endpoint, notifier);

    let credentials = manager
        .get_credentials()
        .await
        .context("failed to obtain Google credentials")?;

    let rows = SheetsClient::new(http)
        .read_rows(
            &credentials,
            &config.sheet.spreadsheet_id,
            &config.sheet.sheet_name,
            &config.sheet.range,
        )
        .await
        .with_context(|| {
            format!(
                "failed to read {}!{} from {}",
                config.sheet.sheet_name, config.sheet.range, config.sheet.spreadsheet_id
            )
        })?;

    if rows.is_empty() {
        println!("no data");
    } else {
        for line in format_rows(&rows) {
            println!("{line}");
        }
    }

    Ok(())
}
