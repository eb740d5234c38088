// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Situ classroom server and CLI.
//!
//! `situ serve` runs the classroom server with the LSP bridge next to it,
//! `situ bridge` runs only the bridge and `situ follow` replays a lesson
//! into a file without an editor attached.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use situ_classroom::config::{BridgeConfig, Config};
use situ_classroom::editor::EditorHandler;
use situ_classroom::lesson::Lesson;
use situ_classroom::lsp::{BridgeConnector, LspBridge};
use situ_classroom::protocol::{ClientMessage, MessageKind, ServerMessage};
use situ_classroom::server::{ClassroomServer, PathValidator, ShellRunner};
use situ_classroom::transport::Client;

/// Command-line arguments for situ.
#[derive(Parser, Debug)]
#[command(name = "situ")]
#[command(about = "Replicate a live coding lesson from one editor to many")]
#[command(version = env!("SITU_VERSION"))]
struct Args {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Subcommands supported by situ.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the classroom server and the LSP bridge.
    Serve {
        /// Workspace root that file access is confined to.
        /// Overrides `server.root` from the config.
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Do not start the LSP bridge.
        #[arg(long)]
        no_bridge: bool,
    },

    /// Run only the LSP bridge.
    Bridge,

    /// Follow a lesson: open a file and replay every action into it.
    Follow {
        /// Classroom server URL (e.g., ws://127.0.0.1:8080).
        #[arg(short, long)]
        server: String,

        /// File to open, absolute or relative to the server's root.
        #[arg(short, long)]
        file: String,

        /// Do not start a language client.
        #[arg(long)]
        no_lsp: bool,
    },
}

/// Entry point for the situ CLI.
///
/// # Errors
///
/// Returns an error if the subcommand fails.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("situ_classroom=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Serve { root, no_bridge } => run_serve(config, root, no_bridge).await,
        Command::Bridge => run_bridge(&config.bridge).await,
        Command::Follow {
            server,
            file,
            no_lsp,
        } => run_follow(&config, &server, file, no_lsp).await,
    }
}

/// Runs the classroom server, and the bridge unless disabled.
///
/// # Errors
///
/// Returns an error if the root is missing or a port cannot be bound.
async fn run_serve(config: Config, root: Option<PathBuf>, no_bridge: bool) -> Result<()> {
    if config.exposes_shell() {
        warn!(
            "Shell commands are enabled on {} without authentication; any host that can reach the server can run commands",
            config.server.host
        );
    }

    let root = root.unwrap_or(config.server.root);
    let validator = PathValidator::new(&root)?;

    let shell = config.shell.enabled.then(|| {
        ShellRunner::new(
            validator.root().to_path_buf(),
            Duration::from_secs(config.shell.timeout_secs),
        )
    });
    if shell.is_none() {
        info!("Shell commands are disabled");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind classroom server to {addr}"))?;
    let server = ClassroomServer::new(validator, shell).start(listener);

    let bridge = if no_bridge {
        None
    } else {
        Some(start_bridge(&config.bridge).await?)
    };

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    server.abort();
    if let Some(bridge) = bridge {
        bridge.abort();
    }
    Ok(())
}

/// Runs the LSP bridge on its own.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
async fn run_bridge(config: &BridgeConfig) -> Result<()> {
    let bridge = start_bridge(config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    bridge.abort();
    Ok(())
}

async fn start_bridge(config: &BridgeConfig) -> Result<JoinHandle<()>> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind LSP bridge to {addr}"))?;
    Ok(LspBridge::new(config.command.clone(), config.args.clone()).start(listener))
}

/// Follows a lesson headlessly.
///
/// Server messages are forwarded from the transport's listeners to this
/// task, which owns the editor session.
///
/// # Errors
///
/// Returns an error if the file cannot be requested.
async fn run_follow(config: &Config, server: &str, file: String, no_lsp: bool) -> Result<()> {
    let mut client = Client::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    for kind in [
        MessageKind::FileContents,
        MessageKind::ReplayAction,
        MessageKind::ShellOutput,
        MessageKind::Error,
    ] {
        let tx = tx.clone();
        client.add_listener(kind, move |message: &ServerMessage| {
            let _ = tx.send(message.clone());
        });
    }
    drop(tx);

    let outbox = client.outbox();
    let mut handler = EditorHandler::new(outbox.clone(), Lesson::new());
    if !no_lsp {
        let client_config = &config.language_client;
        handler = handler.with_language_client(
            BridgeConnector::new(
                client_config.bridge_url.clone(),
                client_config.request_timeout(),
            ),
            client_config.stop_policy(),
        );
    }

    outbox.send(ClientMessage::OpenFile { path: file })?;

    let url = server.to_string();
    let connection = tokio::spawn(async move { client.run(&url).await });

    // The inbox closes once the connection task drops its listeners, so
    // every frame received before the close is still handled.
    tokio::select! {
        _ = handler.follow(&mut rx) => {
            match connection.await {
                Ok(Ok(())) => info!("Lesson connection closed"),
                Ok(Err(e)) => warn!("{e:#}"),
                Err(e) => warn!("Connection task failed: {e}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            connection.abort();
        }
    }

    info!(
        "Replayed {} lesson action(s)",
        handler.lesson().actions.len()
    );
    handler.shutdown().await;
    drop(outbox);
    Ok(())
}
