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

//! Shell commands sent by classroom peers.

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Maximum output size per stream (stdout/stderr) in bytes.
const MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// Standard output (may be truncated).
    pub stdout: String,
    /// Standard error (may be truncated).
    pub stderr: String,
    /// Exit code, or `None` if the process was killed.
    pub exit_code: Option<i32>,
    /// Whether the command was killed due to timeout.
    pub timed_out: bool,
}

impl ShellOutput {
    /// Renders the output as one block of text for a peer.
    ///
    /// Stdout first, then stderr, then a status line unless the command
    /// exited cleanly.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        let status = if self.timed_out {
            Some("[timed out]".to_string())
        } else {
            match self.exit_code {
                Some(0) => None,
                Some(code) => Some(format!("[exit status {code}]")),
                None => Some("[killed]".to_string()),
            }
        };
        if let Some(status) = status {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&status);
        }
        text
    }
}

/// Runs commands through the platform shell in the workspace root.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    cwd: PathBuf,
    timeout: Duration,
}

impl ShellRunner {
    /// Creates a runner for `cwd` that kills commands after `timeout`.
    #[must_use]
    pub const fn new(cwd: PathBuf, timeout: Duration) -> Self {
        Self { cwd, timeout }
    }

    /// Runs `command` (a full shell command line).
    ///
    /// # Errors
    ///
    /// Returns an error if the shell cannot be spawned.
    pub async fn run(&self, command: &str) -> Result<ShellOutput> {
        debug!("Executing `{command}` in {}", self.cwd.display());

        let child = shell_command(command)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn shell for '{command}': {e}"))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ShellOutput {
                stdout: truncate_output(&output.stdout),
                stderr: truncate_output(&output.stderr),
                exit_code: output.status.code(),
                timed_out: false,
            }),
            Ok(Err(e)) => Err(anyhow!("Command failed: {e}")),
            // The dropped child is killed.
            Err(_) => Ok(ShellOutput {
                stdout: String::new(),
                stderr: format!("Command timed out after {}s", self.timeout.as_secs()),
                exit_code: None,
                timed_out: true,
            }),
        }
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Truncates output to `MAX_OUTPUT_BYTES`, converting to lossy UTF-8.
fn truncate_output(bytes: &[u8]) -> String {
    if bytes.len() <= MAX_OUTPUT_BYTES {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        let truncated = String::from_utf8_lossy(&bytes[..MAX_OUTPUT_BYTES]);
        format!("{truncated}\n... (output truncated at {MAX_OUTPUT_BYTES} bytes)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_workspace_root() -> Result<()> {
        let dir = TempDir::new()?;
        let runner = ShellRunner::new(dir.path().to_path_buf(), Duration::from_secs(5));

        let output = runner.run("pwd && echo hi >&2").await?;
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), dir.path().canonicalize()?.to_string_lossy());
        assert_eq!(output.stderr.trim(), "hi");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() -> Result<()> {
        let dir = TempDir::new()?;
        let runner = ShellRunner::new(dir.path().to_path_buf(), Duration::from_millis(200));

        let output = runner.run("sleep 10").await?;
        assert!(output.timed_out);
        assert!(output.exit_code.is_none());
        assert!(output.render().ends_with("[timed out]"));
        Ok(())
    }

    #[test]
    fn test_render() {
        let output = ShellOutput {
            stdout: "built".to_string(),
            stderr: "warning: unused".to_string(),
            exit_code: Some(101),
            timed_out: false,
        };
        assert_eq!(output.render(), "built\nwarning: unused\n[exit status 101]");

        let clean = ShellOutput {
            stdout: "ok\n".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
            timed_out: false,
        };
        assert_eq!(clean.render(), "ok\n");
    }

    #[test]
    fn test_truncate_output() {
        let big = vec![b'x'; MAX_OUTPUT_BYTES + 10];
        let text = truncate_output(&big);
        assert!(text.ends_with("(output truncated at 102400 bytes)"));
        assert_eq!(truncate_output(b"small"), "small");
    }
}
