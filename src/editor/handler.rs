// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The editor session: records local edits, replays remote ones, and keeps
//! a language client attached to the current project.

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::buffer::{ContentChange, TextBuffer};
use super::state::EditorState;
use crate::lesson::Lesson;
use crate::lsp::{Connect, LanguageClient, StopPolicy, stop_with_retry};
use crate::project::is_outside_project;
use crate::protocol::{Action, ClientMessage, EditorAction, EditorActionKind, ServerMessage};
use crate::transport::Outbox;

/// One editor session.
///
/// Owns the open text models, the lesson being recorded or replayed and
/// the language client. Everything runs on the caller's task; the only
/// suspension points are language client start and stop.
pub struct EditorHandler<K: Connect> {
    outbox: Outbox,
    lesson: Lesson,
    state: EditorState<K::Client>,
    models: HashMap<PathBuf, TextBuffer>,
    project_root: Option<PathBuf>,
    connector: Option<K>,
    stop_policy: StopPolicy,
    pending: Vec<Action>,
}

impl<K: Connect> EditorHandler<K> {
    /// Creates a session that sends through `outbox`, without language support.
    #[must_use]
    pub fn new(outbox: Outbox, lesson: Lesson) -> Self {
        Self {
            outbox,
            lesson,
            state: EditorState::default(),
            models: HashMap::new(),
            project_root: None,
            connector: None,
            stop_policy: StopPolicy::default(),
            pending: Vec::new(),
        }
    }

    /// Attaches a language client for every opened project.
    #[must_use]
    pub fn with_language_client(mut self, connector: K, stop_policy: StopPolicy) -> Self {
        self.connector = Some(connector);
        self.stop_policy = stop_policy;
        self
    }

    /// The lesson this session records into.
    #[must_use]
    pub const fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    /// Mutable access to the lesson, e.g. to toggle recording.
    pub const fn lesson_mut(&mut self) -> &mut Lesson {
        &mut self.lesson
    }

    /// Current editor state.
    #[must_use]
    pub const fn state(&self) -> &EditorState<K::Client> {
        &self.state
    }

    /// Project root the language client was started for.
    #[must_use]
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Text of the model for the current file.
    #[must_use]
    pub fn current_text(&self) -> Option<&str> {
        let path = self.state.path.as_ref()?;
        self.models.get(path).map(TextBuffer::text)
    }

    /// Actions waiting for a file to be opened.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// A local edit made by the user.
    ///
    /// Applies the changes and, while recording, appends them to the lesson.
    ///
    /// # Errors
    ///
    /// Returns an error if no file is open or the changes cannot be applied.
    pub fn on_local_change(&mut self, changes: &[ContentChange]) -> Result<()> {
        self.apply_changes(changes)?;

        if self.lesson.is_recording() && !changes.is_empty() {
            let contents = serde_json::to_string(changes)?;
            let seq = self
                .lesson
                .actions
                .add_action(EditorAction::change(contents).into());
            debug!("Recorded change #{seq} ({} operation(s))", changes.len());
        }
        Ok(())
    }

    /// A local save made by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if no file is open or the save cannot be sent.
    pub fn on_local_save(&mut self) -> Result<()> {
        self.save_file()?;

        if self.lesson.is_recording() {
            let seq = self.lesson.actions.add_action(EditorAction::save().into());
            debug!("Recorded save #{seq}");
        }
        Ok(())
    }

    /// Sends the current file to the classroom server.
    ///
    /// # Errors
    ///
    /// Returns an error if no file is open or the connection is closed.
    pub fn save_file(&self) -> Result<()> {
        let path = self.state.path.as_ref().context("No file is open")?;
        let contents = self.current_text().context("No model for the open file")?;

        info!("Saving {}", path.display());
        self.outbox.send(ClientMessage::SaveFile {
            path: path.to_string_lossy().into_owned(),
            contents: contents.to_string(),
        })
    }

    /// Applies serialized edit operations to the current model.
    ///
    /// # Errors
    ///
    /// Returns an error if `contents` is not a JSON list of changes or the
    /// changes cannot be applied.
    pub fn apply_edit(&mut self, contents: &str) -> Result<()> {
        let changes: Vec<ContentChange> =
            serde_json::from_str(contents).context("Invalid edit operations")?;
        self.apply_changes(&changes)
    }

    /// Performs what a recorded action describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit cannot be applied or the save cannot be
    /// sent.
    pub fn apply_action(&mut self, action: &Action) -> Result<()> {
        let Action::EditorAction(editor_action) = action;
        match editor_action.subtype {
            EditorActionKind::EditorChangeAction => {
                let contents = editor_action
                    .contents
                    .as_deref()
                    .context("Change action has no contents")?;
                self.apply_edit(contents)
            }
            EditorActionKind::EditorSaveAction => self.save_file(),
        }
    }

    /// Performs an action received from the lesson and appends it to the log.
    ///
    /// Actions that arrive before any file is open are held until one is.
    /// An action that fails to apply is not logged. The action is never
    /// re-recorded or re-broadcast.
    ///
    /// # Errors
    ///
    /// Returns an error if the action cannot be applied.
    pub fn replay(&mut self, action: Action) -> Result<()> {
        if self.current_text().is_none() {
            debug!("No file open yet, holding replayed action");
            self.pending.push(action);
            return Ok(());
        }

        self.apply_action(&action)?;
        self.lesson.actions.import(action);
        Ok(())
    }

    /// Whether the open file lies outside the language client's project.
    ///
    /// False until both a project root and a file are known.
    #[must_use]
    pub fn changed_projects(&self) -> bool {
        match (&self.project_root, &self.state.path) {
            (Some(root), Some(path)) => is_outside_project(root, path),
            _ => false,
        }
    }

    /// A file's contents arrived from the classroom server.
    ///
    /// Shows them, restarts the language client if there is none or the
    /// file belongs to another project, then replays held actions. A held
    /// action that fails is logged and skipped; the rest still apply.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` matches [`Self::handle_message`].
    pub async fn handle_contents(&mut self, path: PathBuf, contents: String) -> Result<()> {
        self.refresh_project_root();

        self.models
            .entry(path.clone())
            .or_default()
            .set_value(contents.as_str());
        self.state.path = Some(path);
        self.state.contents = Some(contents);

        if self.state.lang_client.is_none() || self.changed_projects() {
            self.restart_language_client().await;
        }

        self.drain_pending();
        Ok(())
    }

    /// Routes one message from the classroom server.
    ///
    /// # Errors
    ///
    /// Returns an error if the message's action cannot be applied.
    pub async fn handle_message(&mut self, message: ServerMessage) -> Result<()> {
        match message {
            ServerMessage::FileContents { contents, path } => {
                self.handle_contents(PathBuf::from(path), contents).await
            }
            ServerMessage::ReplayAction { action } => self.replay(action),
            ServerMessage::ShellOutput { output } => {
                info!("Shell output:\n{output}");
                Ok(())
            }
            ServerMessage::Error { message } => {
                warn!("Classroom server error: {message}");
                Ok(())
            }
        }
    }

    /// Handles every message from `inbox` until all of its senders are gone.
    ///
    /// Messages that fail are logged and skipped. Returns how many
    /// messages were handled.
    pub async fn follow(&mut self, inbox: &mut mpsc::UnboundedReceiver<ServerMessage>) -> usize {
        let mut handled = 0;
        while let Some(message) = inbox.recv().await {
            handled += 1;
            if let Err(e) = self.handle_message(message).await {
                warn!("Failed to handle server message: {e:#}");
            }
        }
        handled
    }

    /// Stops the language client at the end of the session.
    pub async fn shutdown(&mut self) {
        if let Some(mut client) = self.state.lang_client.take() {
            match stop_with_retry(&mut client, self.stop_policy).await {
                Ok(_) => debug!("Language client shut down"),
                Err(e) => warn!("Language client did not shut down cleanly: {e}"),
            }
        }
    }

    fn apply_changes(&mut self, changes: &[ContentChange]) -> Result<()> {
        let path = self.state.path.as_ref().ok_or_else(|| anyhow!("No file is open"))?;
        let model = self
            .models
            .get_mut(path)
            .context("No model for the open file")?;
        model.apply(changes)?;
        self.state.contents = Some(model.text().to_string());
        Ok(())
    }

    fn refresh_project_root(&mut self) {
        if let Some(root) = self
            .state
            .lang_client
            .as_ref()
            .and_then(LanguageClient::project_root)
        {
            self.project_root = Some(root);
        }
    }

    async fn restart_language_client(&mut self) {
        let Some(connector) = &self.connector else {
            return;
        };

        if let Some(mut old) = self.state.lang_client.take() {
            info!("Stopping language client for previous project");
            if let Err(e) = stop_with_retry(&mut old, self.stop_policy).await {
                warn!("Abandoning language client: {e}");
            }
        }

        let Some(path) = self.state.path.clone() else {
            return;
        };
        match connector.connect(&path).await {
            Ok(client) => {
                self.project_root = client.project_root();
                self.state.lang_client = Some(client);
            }
            Err(e) => warn!("Language client unavailable for {}: {e:#}", path.display()),
        }
    }

    fn drain_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        debug!("Replaying {} held action(s)", self.pending.len());
        for action in std::mem::take(&mut self.pending) {
            if let Err(e) = self.replay(action) {
                warn!("Skipping held action that failed to apply: {e:#}");
            }
        }
    }
}
