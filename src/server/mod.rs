// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Classroom WebSocket server.
mod classroom;
/// Workspace path validation.
mod path_security;
/// Shell command execution.
mod shell;

pub use classroom::ClassroomServer;
pub use path_security::PathValidator;
pub use shell::{ShellOutput, ShellRunner};
