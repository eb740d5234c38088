// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Editor integration: text models and the session that records and
//! replays lesson actions against them.

/// Text models and edit operations.
mod buffer;
/// The editor session context.
mod handler;
/// Per-session editor state.
mod state;

pub use buffer::{ContentChange, EditError, Range, TextBuffer};
pub use handler::EditorHandler;
pub use state::EditorState;
