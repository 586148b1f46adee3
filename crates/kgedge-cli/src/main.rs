//! kgedge - inspect and edit single edges of a partitioned graph.
//!
//! A thin front end over `kgedge-core`: every command goes through the
//! edge editor, which in turn only uses the API client's get/post/del.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kgedge_core::auth::SessionState;
use kgedge_core::{ApiClient, ApiError, Config, EdgeEditor, LoginRedirect};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kgedge", version, about = "Inspect and edit graph edges")]
struct Cli {
    /// Config file (defaults to ~/.config/kgedge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Partition (tenant/shard) key sent with every edge request
    #[arg(long, short, global = true, env = "KGEDGE_PARTITION", default_value = "")]
    partition: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show an edge and its properties
    Show { edge_id: String },
    /// Add or replace a property
    SetProp {
        edge_id: String,
        key: String,
        value: String,
    },
    /// Remove a property
    RmProp { edge_id: String, key: String },
    /// Delete an edge
    Delete { edge_id: String },
    /// Show the session state
    Status,
    /// Forget the stored credential
    Logout,
}

/// Terminal stand-in for a browser redirect: tell the user where to log in.
struct TerminalRedirect;

impl LoginRedirect for TerminalRedirect {
    fn redirect(&self, login_url: &str) {
        eprintln!("Login required. Open {} to sign in.", login_url);
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env();
            Ok(config)
        }
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;
    debug!(api = %config.api_base_url, backend = ?config.credential_backend, "Configuration loaded");

    let store = config.credential_store()?;
    let api = ApiClient::from_config(&config, store, Arc::new(TerminalRedirect))?;

    match run(cli.command, api, cli.partition).await {
        // The redirect already told the user what to do.
        Err(e) if e.is_login_redirect() => Ok(()),
        result => result.map_err(Into::into),
    }
}

async fn run(command: Command, api: ApiClient, partition: String) -> Result<(), ApiError> {
    match command {
        Command::Status => {
            let state = api.session().state()?;
            let expires = api
                .session()
                .credential()?
                .and_then(|c| c.expires_at)
                .map(|e| e.to_rfc3339());
            match (state, expires) {
                (SessionState::Valid, Some(at)) => println!("Logged in (token valid until {})", at),
                (SessionState::Valid, None) => println!("Logged in (token does not expire)"),
                (SessionState::Expired, _) => println!("Session expired; it will be refreshed on the next request"),
                (SessionState::Refreshing, _) => println!("Session refresh in progress"),
                (SessionState::NoCredential, _) => println!("Not logged in"),
            }
            Ok(())
        }
        Command::Logout => {
            api.session().logout()?;
            println!("Logged out");
            Ok(())
        }
        Command::Show { edge_id } => {
            let editor = EdgeEditor::new(api, partition);
            let edge = editor.fetch(&edge_id).await?;
            print_edge(&edge);
            Ok(())
        }
        Command::SetProp {
            edge_id,
            key,
            value,
        } => {
            let editor = EdgeEditor::new(api, partition);
            let mut edge = editor.fetch(&edge_id).await?;
            editor.set_property(&mut edge, &key, value).await?;
            info!(edge_id = %edge.id, key = %key, "Property set");
            print_edge(&edge);
            Ok(())
        }
        Command::RmProp { edge_id, key } => {
            let editor = EdgeEditor::new(api, partition);
            let mut edge = editor.fetch(&edge_id).await?;
            editor.remove_property(&mut edge, &key).await?;
            info!(edge_id = %edge.id, key = %key, "Property removed");
            print_edge(&edge);
            Ok(())
        }
        Command::Delete { edge_id } => {
            let editor = EdgeEditor::new(api, partition);
            editor.delete_edge(&edge_id).await?;
            println!("Deleted edge {}", edge_id);
            Ok(())
        }
    }
}

fn print_edge(edge: &kgedge_core::Edge) {
    println!("{}  ({})", edge.display_name(), edge.id);
    for (key, value) in edge.visible_properties() {
        match value {
            serde_json::Value::String(s) => println!("  {} = {}", key, s),
            other => println!("  {} = {}", key, other),
        }
    }
}
