// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Classroom wire messages.
//!
//! Every frame is a JSON object whose `type` field selects the payload
//! shape. Frames with a tag this side does not know are dropped rather
//! than treated as errors, so either side can grow new messages without
//! breaking older peers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Action;
use crate::dispatch::Tagged;

/// Messages sent from an editor client to the classroom server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Run a shell command in the workspace.
    ShellExec {
        /// Command line handed to the platform shell.
        command: String,
    },
    /// Request the contents of a file.
    OpenFile {
        /// Path of the file, absolute or relative to the workspace root.
        path: String,
    },
    /// Write a file.
    SaveFile {
        /// Path of the file, absolute or relative to the workspace root.
        path: String,
        /// Full new contents.
        contents: String,
    },
    /// Publish a recorded lesson action to the other participants.
    RecordAction {
        /// The recorded action.
        action: Action,
    },
}

/// Messages sent from the classroom server to editor clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Combined output of a `ShellExec`.
    ShellOutput {
        /// Rendered stdout/stderr and exit status.
        output: String,
    },
    /// Contents of an opened file.
    FileContents {
        /// Full file contents.
        contents: String,
        /// Resolved path of the file.
        path: String,
    },
    /// A lesson action recorded by another participant.
    ReplayAction {
        /// The action to replay.
        action: Action,
    },
    /// A request could not be served.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Listener key for both message directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// [`ClientMessage::ShellExec`]
    ShellExec,
    /// [`ClientMessage::OpenFile`]
    OpenFile,
    /// [`ClientMessage::SaveFile`]
    SaveFile,
    /// [`ClientMessage::RecordAction`]
    RecordAction,
    /// [`ServerMessage::ShellOutput`]
    ShellOutput,
    /// [`ServerMessage::FileContents`]
    FileContents,
    /// [`ServerMessage::ReplayAction`]
    ReplayAction,
    /// [`ServerMessage::Error`]
    Error,
}

impl MessageKind {
    const CLIENT: [Self; 4] = [
        Self::ShellExec,
        Self::OpenFile,
        Self::SaveFile,
        Self::RecordAction,
    ];
    const SERVER: [Self; 4] = [
        Self::ShellOutput,
        Self::FileContents,
        Self::ReplayAction,
        Self::Error,
    ];

    /// The `type` tag used on the wire.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ShellExec => "ShellExec",
            Self::OpenFile => "OpenFile",
            Self::SaveFile => "SaveFile",
            Self::RecordAction => "RecordAction",
            Self::ShellOutput => "ShellOutput",
            Self::FileContents => "FileContents",
            Self::ReplayAction => "ReplayAction",
            Self::Error => "Error",
        }
    }

    fn find(candidates: &[Self], tag: &str) -> Option<Self> {
        candidates.iter().copied().find(|kind| kind.tag() == tag)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl Tagged for ClientMessage {
    type Kind = MessageKind;

    fn kind(&self) -> MessageKind {
        match self {
            Self::ShellExec { .. } => MessageKind::ShellExec,
            Self::OpenFile { .. } => MessageKind::OpenFile,
            Self::SaveFile { .. } => MessageKind::SaveFile,
            Self::RecordAction { .. } => MessageKind::RecordAction,
        }
    }
}

impl Tagged for ServerMessage {
    type Kind = MessageKind;

    fn kind(&self) -> MessageKind {
        match self {
            Self::ShellOutput { .. } => MessageKind::ShellOutput,
            Self::FileContents { .. } => MessageKind::FileContents,
            Self::ReplayAction { .. } => MessageKind::ReplayAction,
            Self::Error { .. } => MessageKind::Error,
        }
    }
}

/// Why an inbound frame could not be turned into a message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not JSON at all.
    #[error("frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    /// The frame is JSON but has no string `type` field.
    #[error("frame has no \"type\" tag")]
    MissingTag,
    /// The tag is known but the payload does not match it.
    #[error("malformed {kind} payload: {source}")]
    Payload {
        /// The tag that was recognized.
        kind: MessageKind,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes a frame received by the server.
///
/// Returns `Ok(None)` for a well-formed frame whose tag is not a
/// client-to-server message.
///
/// # Errors
///
/// Returns a [`ProtocolError`] if the frame is not JSON, has no tag, or
/// carries a known tag with a mismatched payload.
pub fn decode_client_message(text: &str) -> Result<Option<ClientMessage>, ProtocolError> {
    decode(text, &MessageKind::CLIENT)
}

/// Decodes a frame received by an editor client.
///
/// Returns `Ok(None)` for a well-formed frame whose tag is not a
/// server-to-client message.
///
/// # Errors
///
/// Returns a [`ProtocolError`] if the frame is not JSON, has no tag, or
/// carries a known tag with a mismatched payload.
pub fn decode_server_message(text: &str) -> Result<Option<ServerMessage>, ProtocolError> {
    decode(text, &MessageKind::SERVER)
}

fn decode<T: DeserializeOwned>(
    text: &str,
    known: &[MessageKind],
) -> Result<Option<T>, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::Json)?;

    let tag = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingTag)?;

    let Some(kind) = MessageKind::find(known, tag) else {
        return Ok(None);
    };

    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| ProtocolError::Payload { kind, source })
}
