// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

use std::path::PathBuf;

use crate::lsp::{ClientState, LanguageClient};

/// What the editor is showing right now.
#[derive(Debug)]
pub struct EditorState<C> {
    /// File in the editor, once one has been opened.
    pub path: Option<PathBuf>,
    /// Text of that file as last known.
    pub contents: Option<String>,
    /// Language client for the file's project.
    pub lang_client: Option<C>,
}

impl<C> Default for EditorState<C> {
    fn default() -> Self {
        Self {
            path: None,
            contents: None,
            lang_client: None,
        }
    }
}

impl<C: LanguageClient> EditorState<C> {
    /// Lifecycle state of the language client; `Unstarted` when there is none.
    #[must_use]
    pub fn client_state(&self) -> ClientState {
        self.lang_client
            .as_ref()
            .map_or(ClientState::Unstarted, LanguageClient::state)
    }
}
