// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Situ replicates a live coding lesson from one editor to many.
//!
//! The instructor's editor records its edits and saves as an ordered action
//! log. A classroom server relays every action over WebSocket, and each
//! follower's editor replays it against its own copy of the file, while a
//! language server bridge keeps code intelligence pointed at the right
//! cargo project.

/// Layered configuration from files and environment.
pub mod config;
/// Listener registry keyed by message tag.
pub mod dispatch;
/// Editor session: text models, recording and replay.
pub mod editor;
/// Lesson recording and the action log.
pub mod lesson;
/// Language server plumbing: bridge, client and supervised stop.
pub mod lsp;
/// Project boundary helpers.
pub mod project;
/// Classroom wire messages and lesson actions.
pub mod protocol;
/// Classroom server: file access, shell and action relay.
pub mod server;
/// Editor-side WebSocket connection.
pub mod transport;
