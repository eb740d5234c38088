// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Recorded lesson actions.
mod action;
/// Classroom wire messages and their decoding.
mod message;

pub use action::{Action, ActionKind, EditorAction, EditorActionKind};
pub use message::{
    ClientMessage, MessageKind, ProtocolError, ServerMessage, decode_client_message,
    decode_server_message,
};
