// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Lesson sessions: a recording flag plus the ordered log of actions.

/// Append-only action log with per-kind listeners.
mod action_log;

pub use action_log::{ActionLog, RecordedAction};

use tracing::{info, warn};

use crate::protocol::{Action, ActionKind, ClientMessage};
use crate::transport::Outbox;

/// A lesson in progress.
#[derive(Debug, Default)]
pub struct Lesson {
    recording: bool,
    /// Every action recorded or replayed during this lesson.
    pub actions: ActionLog,
}

impl Lesson {
    /// Creates a lesson that is not recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether local editor events should be captured.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    /// Starts capturing local editor events.
    pub fn start_recording(&mut self) {
        if !self.recording {
            info!("Lesson recording started");
        }
        self.recording = true;
    }

    /// Stops capturing local editor events.
    pub fn stop_recording(&mut self) {
        if self.recording {
            info!("Lesson recording stopped ({} actions)", self.actions.len());
        }
        self.recording = false;
    }

    /// Forwards every action appended from now on to the classroom server.
    pub fn broadcast_to(&mut self, outbox: Outbox) {
        self.actions
            .add_listener(ActionKind::EditorAction, move |action: &Action| {
                if let Err(e) = outbox.send(ClientMessage::RecordAction {
                    action: action.clone(),
                }) {
                    warn!("Failed to broadcast lesson action: {e}");
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EditorAction;
    use anyhow::{Context, Result};

    #[test]
    fn test_recording_toggle() {
        let mut lesson = Lesson::new();
        assert!(!lesson.is_recording());
        lesson.start_recording();
        assert!(lesson.is_recording());
        lesson.stop_recording();
        assert!(!lesson.is_recording());
    }

    #[test]
    fn test_broadcast_forwards_appended_actions() -> Result<()> {
        let (outbox, mut rx) = Outbox::channel();
        let mut lesson = Lesson::new();
        lesson.broadcast_to(outbox);

        let action: Action = EditorAction::save().into();
        lesson.actions.add_action(action.clone());

        let sent = rx.try_recv().context("nothing was broadcast")?;
        assert_eq!(sent, ClientMessage::RecordAction { action });
        assert!(rx.try_recv().is_err());
        Ok(())
    }
}
