//! CodeAssist Bridge CLI.
//!
//! This is the main binary entry point. See the `codeassist_bridge` library
//! for the core functionality.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeassist_bridge::{stdio, webview, Config};
use mimalloc::MiMalloc;

/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "codeassist-bridge")]
#[command(version)]
#[command(about = "Relay between an editor host and the embedded CodeAssist chat app")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge as a headless host over stdin/stdout
    Serve {
        /// Workspace root offered to the chat app
        #[arg(long)]
        workspace: Option<PathBuf>,
        /// Override the chat app URL
        #[arg(long)]
        app_url: Option<String>,
    },
    /// Print the panel document for the chat app
    Html {
        /// Override the chat app URL
        #[arg(long)]
        app_url: Option<String>,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Log to `CODEASSIST_LOG_FILE`, else `<config dir>/bridge.log`.
///
/// Stdout carries the frame protocol, so stderr is only used when no log
/// file can be opened.
fn init_logging() {
    let log_path = std::env::var("CODEASSIST_LOG_FILE")
        .map(PathBuf::from)
        .ok()
        .or_else(|| Config::config_dir().ok().map(|dir| dir.join("bridge.log")));

    let log_file = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        OpenOptions::new().create(true).append(true).open(&path).ok()
    });

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    match log_file {
        Some(file) => builder.target(env_logger::Target::Pipe(Box::new(file))),
        None => builder.target(env_logger::Target::Stderr),
    };
    builder.init();
}

fn load_config(app_url: Option<String>) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(url) = app_url {
        config.app_url = url;
    }
    Ok(config)
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { workspace, app_url } => {
            let config = load_config(app_url)?;
            let workspace = workspace
                .map(|path| {
                    path.canonicalize()
                        .with_context(|| format!("Workspace not found: {}", path.display()))
                })
                .transpose()?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(stdio::serve(config, workspace))?;
        }
        Commands::Html { app_url } => {
            let config = load_config(app_url)?;
            println!("{}", webview::render_html(&config.app_url, &config.panel_title)?);
        }
        Commands::Config { save } => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = Config::config_path()?;
                config.save_to(&path)?;
                eprintln!("Saved to {}", path.display());
            }
        }
    }

    Ok(())
}
