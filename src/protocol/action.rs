// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

use serde::{Deserialize, Serialize};

use crate::dispatch::Tagged;

/// A recorded, replayable lesson event.
///
/// Actions are immutable once created: the log only appends and iterates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// An edit or save performed in the editor.
    EditorAction(EditorAction),
}

/// Listener key for [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// [`Action::EditorAction`].
    EditorAction,
}

impl Tagged for Action {
    type Kind = ActionKind;

    fn kind(&self) -> ActionKind {
        match self {
            Self::EditorAction(_) => ActionKind::EditorAction,
        }
    }
}

/// Which editor event an [`EditorAction`] captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditorActionKind {
    /// Text changed; `contents` holds the JSON edit operations.
    EditorChangeAction,
    /// The file was saved; no payload.
    EditorSaveAction,
}

/// Payload of [`Action::EditorAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorAction {
    /// The captured event.
    pub subtype: EditorActionKind,
    /// Serialized edit operations, opaque to everything but the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

impl EditorAction {
    /// A change action carrying already-serialized edit operations.
    #[must_use]
    pub const fn change(contents: String) -> Self {
        Self {
            subtype: EditorActionKind::EditorChangeAction,
            contents: Some(contents),
        }
    }

    /// A save action.
    #[must_use]
    pub const fn save() -> Self {
        Self {
            subtype: EditorActionKind::EditorSaveAction,
            contents: None,
        }
    }
}

impl From<EditorAction> for Action {
    fn from(action: EditorAction) -> Self {
        Self::EditorAction(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_change_action_wire_shape() -> Result<()> {
        let action = Action::from(EditorAction::change("[]".to_string()));
        let value = serde_json::to_value(&action)?;
        assert_eq!(
            value,
            json!({"type": "EditorAction", "subtype": "EditorChangeAction", "contents": "[]"})
        );
        Ok(())
    }

    #[test]
    fn test_save_action_omits_contents() -> Result<()> {
        let value = serde_json::to_value(Action::from(EditorAction::save()))?;
        assert_eq!(
            value,
            json!({"type": "EditorAction", "subtype": "EditorSaveAction"})
        );

        let parsed: Action =
            serde_json::from_str(r#"{"type":"EditorAction","subtype":"EditorSaveAction"}"#)?;
        assert_eq!(parsed, Action::from(EditorAction::save()));
        assert_eq!(parsed.kind(), ActionKind::EditorAction);
        Ok(())
    }
}
