// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::dispatch::{Listeners, Tagged};
use crate::protocol::{Action, ActionKind};

/// An action as stored in the log.
#[derive(Debug, Clone)]
pub struct RecordedAction {
    /// Position in the log, starting at 0.
    pub seq: u64,
    /// When the action was appended.
    pub recorded_at: DateTime<Utc>,
    /// The action itself.
    pub action: Action,
}

/// Ordered, append-only list of lesson actions.
///
/// Appending notifies the listeners registered for the action's kind,
/// synchronously and in registration order. Nothing is deduplicated or
/// acknowledged.
#[derive(Debug, Default)]
pub struct ActionLog {
    entries: Vec<RecordedAction>,
    listeners: Listeners<Action>,
}

impl ActionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `action` and notifies its listeners. Returns its sequence number.
    pub fn add_action(&mut self, action: Action) -> u64 {
        let seq = self.entries.len() as u64;
        let kind = action.kind();
        self.entries.push(RecordedAction {
            seq,
            recorded_at: Utc::now(),
            action,
        });

        if let Some(entry) = self.entries.last() {
            let notified = self.listeners.dispatch(&entry.action);
            trace!("Action #{seq} ({kind:?}) delivered to {notified} listener(s)");
        }
        seq
    }

    /// Appends an action that was recorded elsewhere, without notifying.
    ///
    /// Replayed actions go through here so they are never forwarded again.
    pub fn import(&mut self, action: Action) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(RecordedAction {
            seq,
            recorded_at: Utc::now(),
            action,
        });
        seq
    }

    /// Registers `listener` for every future action of `kind`.
    pub fn add_listener<F>(&mut self, kind: ActionKind, listener: F)
    where
        F: FnMut(&Action) + Send + 'static,
    {
        self.listeners.add(kind, listener);
    }

    /// Entries in append order.
    pub fn entries(&self) -> impl Iterator<Item = &RecordedAction> {
        self.entries.iter()
    }

    /// Actions in append order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.entries.iter().map(|entry| &entry.action)
    }

    /// Number of recorded actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
