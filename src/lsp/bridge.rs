/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! WebSocket front for language servers.
//!
//! Each connection names a file through the `absPath` query parameter. The
//! bridge finds that file's cargo project, tells the client where it is,
//! then runs a language server in the project and relays JSON-RPC bodies
//! between the socket and the server's stdio.

use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing::{debug, info, warn};

use super::client::{ABS_PATH_PARAM, CARGO_ROOT_KEY};
use super::process::ServerProcess;
use crate::project::find_cargo_root;

/// Spawns one language server per WebSocket connection.
#[derive(Debug, Clone)]
pub struct LspBridge {
    command: String,
    args: Vec<String>,
}

impl LspBridge {
    /// Creates a bridge that runs `command args..` for every session.
    #[must_use]
    pub const fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }

    /// Serves connections from `listener` on a background task.
    #[must_use]
    pub fn start(self, listener: TcpListener) -> JoinHandle<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("LSP bridge listening on ws://{addr} ({})", self.command);
        }
        let bridge = Arc::new(self);

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let bridge = bridge.clone();
                        tokio::spawn(async move {
                            if let Err(e) = bridge.handle_connection(stream).await {
                                warn!("Bridge session for {peer} ended: {e:#}");
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Bridge accept error: {e}");
                    }
                }
            }
        })
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut abs_path = None;
        let ws = accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                abs_path = abs_path_from_query(req.uri().query());
                Ok(resp)
            },
        )
        .await
        .context("WebSocket handshake failed")?;

        let Some(abs_path) = abs_path else {
            let mut ws = ws;
            let _ = ws.close(None).await;
            return Err(anyhow!("connection has no {ABS_PATH_PARAM} parameter"));
        };

        self.serve_session(ws, &abs_path).await
    }

    async fn serve_session(
        &self,
        ws: WebSocketStream<TcpStream>,
        abs_path: &Path,
    ) -> Result<()> {
        let root = project_root_for(abs_path);
        info!("Bridge session for {} in {}", abs_path.display(), root.display());

        let (mut sink, mut stream) = ws.split();
        let announce = json!({ CARGO_ROOT_KEY: root.to_string_lossy() });
        sink.send(Message::text(announce.to_string())).await?;

        let (mut process, mut from_server) =
            ServerProcess::spawn(&self.command, &self.args, &root)?;

        loop {
            tokio::select! {
                body = from_server.recv() => {
                    let Some(body) = body else {
                        info!("Language server for {} exited", root.display());
                        break;
                    };
                    sink.send(Message::text(body)).await?;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => process.send(text.as_str()).await?,
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Bridge client for {} disconnected", root.display());
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Bridge socket error: {e}");
                        break;
                    }
                },
            }
        }

        let _ = sink.close().await;
        process.kill().await;
        Ok(())
    }
}

/// Reads the `absPath` parameter out of a raw query string.
fn abs_path_from_query(query: Option<&str>) -> Option<PathBuf> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == ABS_PATH_PARAM)
        .map(|(_, value)| PathBuf::from(value.into_owned()))
        .filter(|path| !path.as_os_str().is_empty())
}

/// The cargo root above `path`, or the directory the file lives in.
fn project_root_for(path: &Path) -> PathBuf {
    find_cargo_root(path).unwrap_or_else(|| {
        if path.is_dir() {
            path.to_path_buf()
        } else {
            path.parent().unwrap_or(path).to_path_buf()
        }
    })
}
