// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Bounded retry around [`LanguageClient::stop`].

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::client::LanguageClient;

/// How hard to try stopping a language client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// Pause between failed attempts.
    pub retry_delay: Duration,
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Overall deadline across all attempts.
    pub timeout: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            max_attempts: 30,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Why a client could not be stopped.
#[derive(Debug, Error)]
pub enum StopError {
    /// Every attempt failed.
    #[error("language client still running after {attempts} stop attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The last failure.
        last: anyhow::Error,
    },
    /// The deadline passed first.
    #[error("language client did not stop within {0:?}")]
    TimedOut(Duration),
}

/// Stops `client`, retrying while it is still running.
///
/// Returns the number of attempts made; zero if the client was not running.
///
/// # Errors
///
/// Returns [`StopError`] once the attempt cap or the deadline is reached.
pub async fn stop_with_retry<C>(client: &mut C, policy: StopPolicy) -> Result<u32, StopError>
where
    C: LanguageClient,
{
    let deadline = Instant::now() + policy.timeout;
    let mut attempts = 0;

    while client.is_running() {
        attempts += 1;
        let result = match tokio::time::timeout_at(deadline, client.stop()).await {
            Ok(result) => result,
            Err(_) => return Err(StopError::TimedOut(policy.timeout)),
        };

        let Err(e) = result else {
            debug!("Language client stopped after {attempts} attempt(s)");
            break;
        };
        if attempts >= policy.max_attempts && client.is_running() {
            return Err(StopError::Exhausted { attempts, last: e });
        }
        warn!("Stop attempt {attempts} failed, retrying: {e}");

        if Instant::now() + policy.retry_delay >= deadline {
            return Err(StopError::TimedOut(policy.timeout));
        }
        tokio::time::sleep(policy.retry_delay).await;
    }

    Ok(attempts)
}
