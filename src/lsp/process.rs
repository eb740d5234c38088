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

//! A language server child process speaking framed JSON-RPC on stdio.

use anyhow::{Context, Result};
use bytes::BytesMut;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use super::protocol;

/// A running language server.
///
/// Bodies read from its stdout arrive on the receiver returned by
/// [`ServerProcess::spawn`]; the receiver closes when stdout does.
pub struct ServerProcess {
    program: String,
    stdin: ChildStdin,
    reader: JoinHandle<()>,
    child: Child,
}

impl ServerProcess {
    /// Spawns `program` in `cwd` and starts the stdout reader task.
    ///
    /// The child is killed when the handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn spawn(
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn language server: {program}"))?;

        let stdin = child.stdin.take().context("stdin not captured")?;
        let stdout = child.stdout.take().context("stdout not captured")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(reader_task(stdout, tx));

        debug!("Spawned {program} in {}", cwd.display());
        Ok((
            Self {
                program: program.to_string(),
                stdin,
                reader,
                child,
            },
            rx,
        ))
    }

    /// Writes one JSON-RPC body to the server's stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe is closed.
    pub async fn send(&mut self, body: &str) -> Result<()> {
        trace!("-> {}: {body}", self.program);
        self.stdin
            .write_all(&protocol::encode_frame(body))
            .await
            .with_context(|| format!("Failed to write to {}", self.program))?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Kills the process and waits for it to exit.
    pub async fn kill(mut self) {
        self.reader.abort();
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill {}: {e}", self.program);
        }
    }
}

async fn reader_task(stdout: ChildStdout, tx: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(stdout);
    let mut buffer = BytesMut::with_capacity(8192);
    let mut chunk = [0u8; 4096];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!("Language server stdout closed");
                return;
            }
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) => {
                error!("Error reading from language server stdout: {e}");
                return;
            }
        }

        loop {
            match protocol::decode_frame(&mut buffer) {
                Ok(Some(body)) => {
                    trace!("<- {body}");
                    if tx.send(body).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // The stream can't be resynchronized after a bad header.
                    error!("Unreadable frame from language server: {e}");
                    return;
                }
            }
        }
    }
}
