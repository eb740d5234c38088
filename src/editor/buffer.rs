// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! In-memory text model with Monaco-compatible edit operations.
//!
//! Edits arrive as the JSON a Monaco editor emits from
//! `onDidChangeModelContent`: 1-based line/column ranges whose columns
//! count UTF-16 code units. Positions outside the document are clamped the
//! way Monaco validates them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A span of text, 1-based, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    /// Line of the first character.
    pub start_line_number: u32,
    /// UTF-16 column of the first character.
    pub start_column: u32,
    /// Line just past the span.
    pub end_line_number: u32,
    /// UTF-16 column just past the span.
    pub end_column: u32,
}

impl Range {
    /// Builds a range from its four coordinates.
    #[must_use]
    pub const fn new(
        start_line_number: u32,
        start_column: u32,
        end_line_number: u32,
        end_column: u32,
    ) -> Self {
        Self {
            start_line_number,
            start_column,
            end_line_number,
            end_column,
        }
    }

    /// An empty range at one position.
    #[must_use]
    pub const fn caret(line: u32, column: u32) -> Self {
        Self::new(line, column, line, column)
    }
}

/// One edit operation: replace `range` with `text`.
///
/// Extra fields Monaco attaches (`rangeOffset`, `rangeLength`,
/// `forceMoveMarkers`) are kept so a recorded change survives a round trip
/// unchanged, but only `range` and `text` drive the edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChange {
    /// The replaced span, in pre-edit coordinates.
    pub range: Range,
    /// UTF-16 offset of the span start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_offset: Option<u32>,
    /// UTF-16 length of the replaced span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_length: Option<u32>,
    /// Replacement text.
    pub text: String,
    /// Monaco marker hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_move_markers: Option<bool>,
}

impl ContentChange {
    /// Replaces `range` with `text`.
    #[must_use]
    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            range_offset: None,
            range_length: None,
            text: text.into(),
            force_move_markers: None,
        }
    }

    /// Inserts `text` at a position.
    #[must_use]
    pub fn insert(line: u32, column: u32, text: impl Into<String>) -> Self {
        Self::replace(Range::caret(line, column), text)
    }
}

/// Why a batch of edits was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// Two operations in one batch touch the same text.
    #[error("edit ranges overlap: {first:?} and {second:?}")]
    Overlapping {
        /// The earlier range in document order.
        first: Range,
        /// The range that starts inside `first`.
        second: Range,
    },
}

/// The text of one open file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    version: u64,
}

impl TextBuffer {
    /// Creates a buffer holding `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            version: 1,
        }
    }

    /// Current contents.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Incremented on every change.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Replaces the whole contents.
    pub fn set_value(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.version += 1;
    }

    /// Number of lines; an empty buffer has one.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.text.matches('\n').count() + 1
    }

    /// Applies a batch of edits atomically.
    ///
    /// All ranges refer to the text before the batch, as in Monaco's
    /// `executeEdits`. Insertions at the same position keep batch order.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::Overlapping`] if two ranges overlap; the buffer
    /// is left untouched.
    pub fn apply(&mut self, changes: &[ContentChange]) -> Result<(), EditError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut spans: Vec<(usize, usize, &ContentChange)> = changes
            .iter()
            .map(|change| {
                let r = change.range;
                let a = self.offset_at(r.start_line_number, r.start_column);
                let b = self.offset_at(r.end_line_number, r.end_column);
                (a.min(b), a.max(b), change)
            })
            .collect();
        spans.sort_by_key(|&(start, end, _)| (start, end));

        for pair in spans.windows(2) {
            let (_, first_end, first) = pair[0];
            let (second_start, _, second) = pair[1];
            if second_start < first_end {
                return Err(EditError::Overlapping {
                    first: first.range,
                    second: second.range,
                });
            }
        }

        for &(start, end, change) in spans.iter().rev() {
            self.text.replace_range(start..end, &change.text);
        }
        self.version += 1;
        Ok(())
    }

    /// Byte offset of a 1-based line / UTF-16 column position, clamped.
    #[must_use]
    pub fn offset_at(&self, line: u32, column: u32) -> usize {
        if line == 0 {
            return 0;
        }

        let mut line_start = 0;
        for _ in 1..line {
            match self.text[line_start..].find('\n') {
                Some(i) => line_start += i + 1,
                None => return self.text.len(),
            }
        }

        let line_end = self.text[line_start..]
            .find('\n')
            .map_or(self.text.len(), |i| line_start + i);
        let content = &self.text[line_start..line_end];
        let content = content.strip_suffix('\r').unwrap_or(content);

        let mut units = column.saturating_sub(1) as usize;
        let mut offset = line_start;
        for ch in content.chars() {
            let width = ch.len_utf16();
            if width > units {
                break;
            }
            units -= width;
            offset += ch.len_utf8();
        }
        offset
    }
}
