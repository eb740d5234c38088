// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! WebSocket server that editors open files through and that relays the
//! lesson between them.
//!
//! Every recorded action is appended to one server-side lesson log and
//! relayed to all other connected peers. A peer that joins late first
//! receives the whole log, then live actions.

use anyhow::{Context, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, warn};

use super::path_security::PathValidator;
use super::shell::ShellRunner;
use crate::dispatch::Tagged;
use crate::lesson::ActionLog;
use crate::protocol::{Action, ClientMessage, ServerMessage, decode_client_message};

/// Capacity of the relay channel; slower peers skip what falls off.
const RELAY_CAPACITY: usize = 1024;

type PeerSink = SplitSink<WebSocketStream<TcpStream>, Message>;

#[derive(Debug, Clone)]
struct Relayed {
    from: u64,
    action: Action,
}

/// The classroom server.
pub struct ClassroomServer {
    validator: PathValidator,
    shell: Option<ShellRunner>,
    lesson: Mutex<ActionLog>,
    relay: broadcast::Sender<Relayed>,
    next_peer: AtomicU64,
}

impl ClassroomServer {
    /// Creates a server confined to the validator's root.
    ///
    /// `ShellExec` is refused when `shell` is `None`.
    #[must_use]
    pub fn new(validator: PathValidator, shell: Option<ShellRunner>) -> Self {
        let (relay, _) = broadcast::channel(RELAY_CAPACITY);
        Self {
            validator,
            shell,
            lesson: Mutex::new(ActionLog::new()),
            relay,
            next_peer: AtomicU64::new(1),
        }
    }

    /// Serves connections from `listener` on a background task.
    #[must_use]
    pub fn start(self, listener: TcpListener) -> JoinHandle<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(
                "Classroom server listening on ws://{addr} (root {})",
                self.validator.root().display()
            );
        }
        let server = Arc::new(self);

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, addr).await {
                                debug!("Classroom connection {addr} error: {e:#}");
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Classroom accept error: {e}");
                    }
                }
            }
        })
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let ws = accept_async(stream)
            .await
            .context("WebSocket handshake failed")?;
        let peer = self.next_peer.fetch_add(1, Ordering::SeqCst);
        info!("Peer {peer} connected from {addr}");

        let (mut sink, mut stream) = ws.split();

        // Subscribe under the lock so nothing lands between backlog and live.
        let (backlog, mut relay) = {
            let log = self.lesson.lock().await;
            (log.actions().cloned().collect::<Vec<_>>(), self.relay.subscribe())
        };
        if !backlog.is_empty() {
            debug!("Sending {} backlog action(s) to peer {peer}", backlog.len());
        }
        for action in backlog {
            send(&mut sink, &ServerMessage::ReplayAction { action }).await?;
        }

        loop {
            tokio::select! {
                relayed = relay.recv() => match relayed {
                    Ok(relayed) if relayed.from != peer => {
                        send(&mut sink, &ServerMessage::ReplayAction { action: relayed.action }).await?;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Peer {peer} fell behind and skipped {skipped} action(s)");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.handle_text(peer, text.as_str()).await {
                            send(&mut sink, &reply).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("Classroom socket error"),
                },
            }
        }

        info!("Peer {peer} disconnected");
        Ok(())
    }

    async fn handle_text(&self, peer: u64, text: &str) -> Option<ServerMessage> {
        match decode_client_message(text) {
            Ok(Some(message)) => {
                debug!("Peer {peer}: {}", message.kind());
                self.handle_message(peer, message).await
            }
            Ok(None) => {
                debug!("Peer {peer}: dropping message with unknown tag");
                None
            }
            Err(e) => {
                warn!("Peer {peer}: malformed message: {e}");
                Some(ServerMessage::Error {
                    message: format!("Malformed message: {e}"),
                })
            }
        }
    }

    /// Answers one message; `None` means no reply.
    async fn handle_message(&self, peer: u64, message: ClientMessage) -> Option<ServerMessage> {
        let result = match message {
            ClientMessage::OpenFile { path } => self.open_file(&path).await.map(Some),
            ClientMessage::SaveFile { path, contents } => {
                self.save_file(&path, &contents).await.map(|()| None)
            }
            ClientMessage::ShellExec { command } => self.shell_exec(&command).await.map(Some),
            ClientMessage::RecordAction { action } => {
                self.record(peer, action).await;
                Ok(None)
            }
        };

        result.unwrap_or_else(|e| {
            warn!("Peer {peer}: {e:#}");
            Some(ServerMessage::Error {
                message: format!("{e:#}"),
            })
        })
    }

    async fn open_file(&self, requested: &str) -> Result<ServerMessage> {
        let path = self.validator.validate_read(requested)?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {requested}"))?;
        Ok(ServerMessage::FileContents {
            contents,
            path: path.to_string_lossy().into_owned(),
        })
    }

    async fn save_file(&self, requested: &str, contents: &str) -> Result<()> {
        let path = self.validator.validate_write(requested)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {requested}"))?;
        info!("Saved {}", path.display());
        Ok(())
    }

    async fn shell_exec(&self, command: &str) -> Result<ServerMessage> {
        let shell = self
            .shell
            .as_ref()
            .context("Shell commands are disabled on this server")?;
        let output = shell.run(command).await?;
        Ok(ServerMessage::ShellOutput {
            output: output.render(),
        })
    }

    async fn record(&self, peer: u64, action: Action) {
        let mut log = self.lesson.lock().await;
        let seq = log.add_action(action.clone());
        // No subscribers is fine; late joiners read the log.
        let _ = self.relay.send(Relayed { from: peer, action });
        drop(log);
        debug!("Peer {peer} recorded action #{seq}");
    }
}

async fn send(sink: &mut PeerSink, message: &ServerMessage) -> Result<()> {
    let text = serde_json::to_string(message)?;
    sink.send(Message::text(text)).await?;
    Ok(())
}
