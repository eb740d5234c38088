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

//! Language client lifecycle state.

use serde::Serialize;
use std::fmt;

/// Where a language client is in its lifecycle.
///
/// `Unstarted -> Starting -> Running -> Stopping -> Stopped`. A stop that
/// fails moves the client back to `Running` so it can be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    /// Created but not yet connected.
    Unstarted,
    /// Handshake in progress.
    Starting,
    /// Ready for requests.
    Running,
    /// Shutdown requested, not yet confirmed.
    Stopping,
    /// Connection closed.
    Stopped,
}

impl ClientState {
    /// Create from atomic u8 value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unstarted,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    /// Convert to atomic u8 value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Unstarted => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
            Self::Stopped => 4,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unstarted => "unstarted",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_state_conversion() {
        for state in [
            ClientState::Unstarted,
            ClientState::Starting,
            ClientState::Running,
            ClientState::Stopping,
            ClientState::Stopped,
        ] {
            assert_eq!(ClientState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ClientState::from_u8(99), ClientState::Stopped);
        assert_eq!(ClientState::Running.to_string(), "running");
    }
}
