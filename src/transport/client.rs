// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Editor-side connection to the classroom server.
//!
//! Outgoing messages are queued through an [`Outbox`] so any component can
//! send without owning the socket. Incoming frames are decoded and handed
//! to the listeners registered for their tag.

use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::dispatch::{Listeners, Tagged};
use crate::protocol::{
    ClientMessage, MessageKind, ProtocolError, ServerMessage, decode_server_message,
};

/// Cloneable handle for queueing messages to the classroom server.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl Outbox {
    /// Creates an outbox and the receiver that drains it.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues `message` for sending.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection task has already ended.
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        debug!("Sending message {}", message.kind());
        self.tx
            .send(message)
            .map_err(|_| anyhow!("classroom connection is closed"))
    }
}

/// Classroom connection: listener registry plus the outgoing queue.
pub struct Client {
    listeners: Listeners<ServerMessage>,
    outbox: Outbox,
    outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    ready: Arc<AtomicBool>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates an unconnected client.
    #[must_use]
    pub fn new() -> Self {
        let (outbox, outgoing) = Outbox::channel();
        Self {
            listeners: Listeners::new(),
            outbox,
            outgoing,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle for sending messages once connected.
    ///
    /// Messages queued before the connection opens are sent right after it does.
    #[must_use]
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Flag that flips to `true` once the socket is open.
    #[must_use]
    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        self.ready.clone()
    }

    /// Registers `listener` for server messages of `kind`.
    pub fn add_listener<F>(&mut self, kind: MessageKind, listener: F)
    where
        F: FnMut(&ServerMessage) + Send + 'static,
    {
        self.listeners.add(kind, listener);
    }

    /// Decodes one inbound frame and dispatches it.
    ///
    /// Returns how many listeners ran; frames with an unknown tag run none.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the frame cannot be decoded.
    pub fn dispatch_text(&mut self, text: &str) -> Result<usize, ProtocolError> {
        dispatch_frame(&mut self.listeners, text)
    }

    /// Connects to `url` and pumps messages until either side closes.
    ///
    /// Malformed inbound frames are logged and skipped. The loop also ends
    /// once every [`Outbox`] handle has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a socket
    /// read/write fails.
    pub async fn run(self, url: &str) -> Result<()> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to classroom server at {url}"))?;

        let Self {
            mut listeners,
            outbox,
            mut outgoing,
            ready,
        } = self;
        // Only external handles keep the queue open from here on.
        drop(outbox);

        ready.store(true, Ordering::SeqCst);
        info!("Connected to classroom server at {url}");

        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                queued = outgoing.recv() => {
                    let Some(message) = queued else {
                        debug!("All outboxes dropped, closing connection");
                        let _ = sink.close().await;
                        break;
                    };
                    let text = serde_json::to_string(&message)?;
                    trace!("-> {text}");
                    sink.send(Message::text(text)).await?;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = dispatch_frame(&mut listeners, text.as_str()) {
                            warn!("Dropping malformed message: {e}");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Classroom server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        ready.store(false, Ordering::SeqCst);
                        return Err(e).context("Classroom connection failed");
                    }
                },
            }
        }

        ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn dispatch_frame(
    listeners: &mut Listeners<ServerMessage>,
    text: &str,
) -> Result<usize, ProtocolError> {
    let Some(message) = decode_server_message(text)? else {
        trace!("Dropping message with unknown tag: {text}");
        return Ok(0);
    };

    debug!("Received message {}", message.kind());
    Ok(listeners.dispatch(&message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_text_reaches_registered_listeners_in_order() -> Result<()> {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut client = Client::new();

        for id in 1..=2 {
            let order = order.clone();
            client.add_listener(MessageKind::ShellOutput, move |m: &ServerMessage| {
                if let (Ok(mut order), ServerMessage::ShellOutput { output }) = (order.lock(), m) {
                    order.push(format!("{id}:{output}"));
                }
            });
        }
        let other = order.clone();
        client.add_listener(MessageKind::FileContents, move |_: &ServerMessage| {
            if let Ok(mut order) = other.lock() {
                order.push("file".to_string());
            }
        });

        let ran = client.dispatch_text(r#"{"type":"ShellOutput","output":"ok"}"#)?;
        assert_eq!(ran, 2);

        let order = order.lock().map(|o| o.clone()).unwrap_or_default();
        assert_eq!(order, vec!["1:ok", "2:ok"]);
        Ok(())
    }

    #[test]
    fn test_dispatch_text_unknown_and_malformed() -> Result<()> {
        let mut client = Client::new();
        client.add_listener(MessageKind::ShellOutput, |_: &ServerMessage| {});

        assert_eq!(client.dispatch_text(r#"{"type":"Whatever"}"#)?, 0);
        assert!(client.dispatch_text(r#"{"type":"ShellOutput"}"#).is_err());
        assert!(client.dispatch_text("{").is_err());
        Ok(())
    }

    #[test]
    fn test_outbox_fails_after_receiver_dropped() {
        let (outbox, rx) = Outbox::channel();
        drop(rx);
        let result = outbox.send(ClientMessage::OpenFile {
            path: "a.rs".to_string(),
        });
        assert!(result.is_err());
    }
}
