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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lsp::StopPolicy;

/// Project-local configuration file, read from the current directory.
pub const PROJECT_CONFIG_FILE: &str = ".situ.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "SITU";

/// `<config_dir>/situ/config.toml`, if the platform has a config directory.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("situ").join("config.toml"))
}

/// All situ settings.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Classroom server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LSP bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Shell command settings.
    #[serde(default)]
    pub shell: ShellConfig,

    /// Follower-side language client settings.
    #[serde(default)]
    pub language_client: LanguageClientConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
/// `[server]`: the classroom server.
pub struct ServerConfig {
    /// Interface to listen on (default: 0.0.0.0)
    pub host: String,

    /// Port to listen on (default: 8080)
    pub port: u16,

    /// Workspace root that file access is confined to (default: current directory)
    pub root: PathBuf,
}

impl ServerConfig {
    /// Whether the server listens beyond the loopback interface.
    ///
    /// Host names other than `localhost` count as reachable.
    #[must_use]
    pub fn is_reachable_remotely(&self) -> bool {
        match self.host.parse::<IpAddr>() {
            Ok(ip) => !ip.is_loopback(),
            Err(_) => !self.host.eq_ignore_ascii_case("localhost"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
/// `[bridge]`: the LSP bridge.
pub struct BridgeConfig {
    /// Interface to listen on (default: 127.0.0.1)
    pub host: String,

    /// Port to listen on (default: 8081)
    pub port: u16,

    /// The language server to run (e.g., "rust-analyzer")
    pub command: String,

    /// Arguments to pass to the command
    pub args: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            command: "rust-analyzer".to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
/// `[shell]`: `ShellExec` handling.
pub struct ShellConfig {
    /// Whether peers may run shell commands (default: true)
    pub enabled: bool,

    /// Seconds before a command is killed (default: 120)
    pub timeout_secs: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
/// `[language_client]`: followers' language client.
pub struct LanguageClientConfig {
    /// Bridge to connect through (default: `ws://127.0.0.1:8081`)
    pub bridge_url: String,

    /// Seconds to wait for a language server response (default: 30)
    pub request_timeout_secs: u64,

    /// Milliseconds between stop attempts (default: 1000)
    pub stop_retry_delay_ms: u64,

    /// Stop attempts before giving up (default: 30)
    pub stop_max_attempts: u32,

    /// Seconds before giving up on stopping (default: 60)
    pub stop_timeout_secs: u64,
}

impl Default for LanguageClientConfig {
    fn default() -> Self {
        Self {
            bridge_url: "ws://127.0.0.1:8081".to_string(),
            request_timeout_secs: 30,
            stop_retry_delay_ms: 1000,
            stop_max_attempts: 30,
            stop_timeout_secs: 60,
        }
    }
}

impl LanguageClientConfig {
    /// Request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy for stopping clients.
    #[must_use]
    pub const fn stop_policy(&self) -> StopPolicy {
        StopPolicy {
            retry_delay: Duration::from_millis(self.stop_retry_delay_ms),
            max_attempts: self.stop_max_attempts,
            timeout: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}

impl Config {
    /// Whether any host on the network may run shell commands.
    #[must_use]
    pub fn exposes_shell(&self) -> bool {
        self.shell.enabled && self.server.is_reachable_remotely()
    }

    /// Load configuration from standard paths or a specific file.
    ///
    /// Later sources override earlier ones: defaults, the user config,
    /// `.situ.toml` in the current directory, `explicit_file`, then
    /// `SITU_*` environment variables (`SITU_SERVER__PORT=9000`).
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be parsed or a value has the wrong type.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder();

        // 1. Start with defaults; the rest come from `Default` impls
        builder = builder
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("bridge.host", defaults.bridge.host)?
            .set_default("bridge.port", i64::from(defaults.bridge.port))?
            .set_default("bridge.command", defaults.bridge.command)?;

        // 2. Load from user config directory (~/.config/situ/config.toml)
        if let Some(config_path) = user_config_path()
            && config_path.exists()
        {
            builder = builder.add_source(config::File::from(config_path));
        }

        // 3. Load from the project config in the current directory
        let project_path = PathBuf::from(PROJECT_CONFIG_FILE);
        if project_path.exists() {
            builder = builder.add_source(config::File::from(project_path));
        }

        // 4. Load from explicit file if provided
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 5. Load from environment variables (SITU_SERVER__PORT, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
