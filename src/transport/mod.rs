// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// WebSocket client that dispatches classroom messages by tag.
mod client;

pub use client::{Client, Outbox};
