// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// WebSocket bridge that runs a language server per project.
pub mod bridge;
/// Language client over the bridge.
pub mod client;
/// Language server child process.
pub mod process;
/// JSON-RPC messages and stdio framing.
pub mod protocol;
/// Client lifecycle state.
pub mod state;
/// Supervised shutdown.
pub mod supervisor;

pub use bridge::LspBridge;
pub use client::{BridgeClient, BridgeConnector, Connect, LanguageClient};
pub use process::ServerProcess;
pub use state::ClientState;
pub use supervisor::{StopError, StopPolicy, stop_with_retry};
