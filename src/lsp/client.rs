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

//! Language client that reaches its server through the LSP bridge.

use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use lsp_types::{
    ClientCapabilities, InitializeParams, InitializeResult, InitializedParams, Uri,
    WorkspaceFolder,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::protocol::{
    Incoming, METHOD_NOT_FOUND, NotificationMessage, RequestId, RequestMessage, ResponseMessage,
};
use super::state::ClientState;

/// Key of the bridge's project-root push.
pub const CARGO_ROOT_KEY: &str = "cargo-root";

/// Query parameter naming the file a bridge session is for.
pub const ABS_PATH_PARAM: &str = "absPath";

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>>;

/// What the editor needs from a language client.
pub trait LanguageClient: Send {
    /// Current lifecycle state.
    fn state(&self) -> ClientState;

    /// Whether the client is ready for requests.
    fn is_running(&self) -> bool {
        self.state() == ClientState::Running
    }

    /// Latest project root reported by the server side, if any.
    fn project_root(&self) -> Option<PathBuf>;

    /// Asks the server to shut down.
    ///
    /// On failure the client is back in [`ClientState::Running`] unless the
    /// connection is gone.
    fn stop(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Creates language clients for files.
pub trait Connect: Send + Sync {
    /// The client type produced.
    type Client: LanguageClient;

    /// Connects and starts a client for the project containing `path`.
    fn connect(&self, path: &Path) -> impl Future<Output = Result<Self::Client>> + Send;
}

/// A language client session over one bridge WebSocket.
pub struct BridgeClient {
    next_id: AtomicI64,
    state: Arc<AtomicU8>,
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
    cargo_root: watch::Receiver<Option<PathBuf>>,
    request_timeout: Duration,
    _io_handle: JoinHandle<()>,
}

impl BridgeClient {
    /// Opens the WebSocket at `url` and starts the I/O task.
    ///
    /// The client is [`ClientState::Unstarted`] until [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(url: &str, request_timeout: Duration) -> Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to LSP bridge at {url}"))?;
        debug!("Connected to LSP bridge at {url}");

        let state = Arc::new(AtomicU8::new(ClientState::Unstarted.as_u8()));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (root_tx, cargo_root) = watch::channel(None);
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        let io_handle = tokio::spawn(io_task(
            socket,
            outgoing_rx,
            pending.clone(),
            root_tx,
            state.clone(),
        ));

        Ok(Self {
            next_id: AtomicI64::new(1),
            state,
            outgoing,
            pending,
            cargo_root,
            request_timeout,
            _io_handle: io_handle,
        })
    }

    /// Runs the `initialize` / `initialized` handshake for `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects or does not answer
    /// `initialize`; the client is then [`ClientState::Stopped`].
    pub async fn start(&mut self, root: &Path) -> Result<InitializeResult> {
        self.set_state(ClientState::Starting);
        match self.handshake(root).await {
            Ok(result) => {
                self.set_state(ClientState::Running);
                info!("Language client running for {}", root.display());
                Ok(result)
            }
            Err(e) => {
                self.set_state(ClientState::Stopped);
                Err(e)
            }
        }
    }

    async fn handshake(&self, root: &Path) -> Result<InitializeResult> {
        let root_uri: Uri = Url::from_directory_path(root)
            .map_err(|()| anyhow!("Invalid root path {}", root.display()))?
            .as_str()
            .parse()
            .map_err(|e| anyhow!("Invalid root path {}: {e:?}", root.display()))?;

        let params = InitializeParams {
            process_id: Some(std::process::id()),
            capabilities: ClientCapabilities::default(),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root_uri,
                name: root
                    .file_name()
                    .map_or_else(|| "workspace".to_string(), |s| s.to_string_lossy().to_string()),
            }]),
            ..Default::default()
        };

        let result = self.request("initialize", serde_json::to_value(params)?).await?;
        let result: InitializeResult =
            serde_json::from_value(result).context("Failed to parse initialize result")?;
        self.notify("initialized", serde_json::to_value(InitializedParams {})?)?;
        Ok(result)
    }

    /// Waits until the bridge has reported the project root.
    ///
    /// Gives up after the request timeout.
    pub async fn wait_for_project_root(&mut self) -> Option<PathBuf> {
        let changed = tokio::time::timeout(
            self.request_timeout,
            self.cargo_root.wait_for(Option::is_some),
        )
        .await
        .ok()?;
        changed.ok().and_then(|root| root.clone())
    }

    /// Sends a request and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, on a closed connection, or if the
    /// server answers with an error.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = RequestMessage::new(id.clone(), method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.send(&request) {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(anyhow!("LSP bridge closed connection")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(anyhow!(
                    "LSP request '{method}' timed out after {:?}",
                    self.request_timeout
                ));
            }
        };

        if let Some(error) = response.error {
            return Err(anyhow!("LSP error {}: {}", error.code, error.message));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Sends a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    pub fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.send(&NotificationMessage::new(method, params))
    }

    fn send<T: serde::Serialize>(&self, message: &T) -> Result<()> {
        let body = serde_json::to_string(message)?;
        trace!("-> bridge: {body}");
        self.outgoing
            .send(Message::text(body))
            .map_err(|_| anyhow!("LSP bridge connection is closed"))
    }

    fn set_state(&self, state: ClientState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

impl LanguageClient for BridgeClient {
    fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn project_root(&self) -> Option<PathBuf> {
        self.cargo_root.borrow().clone()
    }

    async fn stop(&mut self) -> Result<()> {
        if matches!(self.state(), ClientState::Unstarted | ClientState::Stopped) {
            return Ok(());
        }

        self.set_state(ClientState::Stopping);
        if let Err(e) = self.request("shutdown", Value::Null).await {
            // Leave `Stopped` alone if the socket closed meanwhile.
            let _ = self.state.compare_exchange(
                ClientState::Stopping.as_u8(),
                ClientState::Running.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            return Err(e.context("Language client shutdown failed"));
        }

        self.notify("exit", Value::Null)?;
        let _ = self.outgoing.send(Message::Close(None));
        self.set_state(ClientState::Stopped);
        info!("Language client stopped");
        Ok(())
    }
}

async fn io_task<S>(
    socket: tokio_tungstenite::WebSocketStream<S>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    pending: PendingMap,
    cargo_root: watch::Sender<Option<PathBuf>>,
    state: Arc<AtomicU8>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            queued = outgoing.recv() => {
                let Some(message) = queued else {
                    let _ = sink.close().await;
                    break;
                };
                if let Err(e) = sink.send(message).await {
                    warn!("Failed to write to LSP bridge: {e}");
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_frame(text.as_str(), &pending, &cargo_root).await
                        && let Err(e) = sink.send(reply).await
                    {
                        warn!("Failed to answer server request: {e}");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("LSP bridge connection failed: {e}");
                    break;
                }
            },
        }
    }

    state.store(ClientState::Stopped.as_u8(), Ordering::SeqCst);
    // Dropping the senders fails every waiting request.
    pending.lock().await.clear();
    debug!("LSP bridge connection closed");
}

/// Routes one bridge frame; returns the reply to send, if any.
async fn handle_frame(
    text: &str,
    pending: &PendingMap,
    cargo_root: &watch::Sender<Option<PathBuf>>,
) -> Option<Message> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("Dropping unparseable bridge frame: {e}");
            return None;
        }
    };

    if let Some(root) = value.get(CARGO_ROOT_KEY).and_then(Value::as_str) {
        debug!("Bridge reports project root {root}");
        cargo_root.send_replace(Some(PathBuf::from(root)));
        return None;
    }

    match Incoming::from_value(value) {
        Ok(Incoming::Request(request)) => {
            debug!("Received server request: {} (id: {:?})", request.method, request.id);
            let response = ResponseMessage::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method '{}' not supported by client", request.method),
            );
            serde_json::to_string(&response).ok().map(Message::text)
        }
        Ok(Incoming::Response(response)) => {
            let sender = match &response.id {
                Some(id) => pending.lock().await.remove(id),
                None => None,
            };
            match sender {
                Some(sender) => {
                    let _ = sender.send(response);
                }
                None => warn!("Received response for unknown request id: {:?}", response.id),
            }
            None
        }
        Ok(Incoming::Notification(notification)) => {
            match notification.method.as_str() {
                "window/logMessage" | "window/showMessage" => {
                    if let Some(message) = notification.params.get("message").and_then(Value::as_str)
                    {
                        debug!("Language server message: {message}");
                    }
                }
                method => trace!("Ignoring notification: {method}"),
            }
            None
        }
        Err(e) => {
            warn!("Dropping bridge frame: {e}");
            None
        }
    }
}

/// Connects [`BridgeClient`]s through the bridge at `base_url`.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    base_url: String,
    request_timeout: Duration,
}

impl BridgeConnector {
    /// Creates a connector for the bridge at `base_url` (e.g. `ws://127.0.0.1:8081`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout,
        }
    }

    /// Bridge URL for a session about `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn session_url(&self, path: &Path) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid bridge URL: {}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair(ABS_PATH_PARAM, &path.to_string_lossy());
        Ok(url)
    }
}

impl Connect for BridgeConnector {
    type Client = BridgeClient;

    async fn connect(&self, path: &Path) -> Result<BridgeClient> {
        let url = self.session_url(path)?;
        let mut client = BridgeClient::connect(url.as_str(), self.request_timeout).await?;

        let root = match client.wait_for_project_root().await {
            Some(root) => root,
            None => {
                warn!("Bridge did not report a project root for {}", path.display());
                path.parent().unwrap_or(path).to_path_buf()
            }
        };
        client.start(&root).await?;
        Ok(client)
    }
}
