//! # Edit Session
//!
//! A session owns the committed document, the current selection and the
//! undo history. Editing happens in a [`Transaction`] opened with
//! [`Session::tr`] and committed with [`Session::apply`].
//!
//! Sessions are plain values. Several sessions over the same document are
//! independent: build each from the same persisted form.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::config::EditorConfig;
use crate::document::{Document, Inspection, Resolved};
use crate::errors::Result;
use crate::history::History;
use crate::id_generator::IdGenerator;
use crate::node::Node;
use crate::path::Path;
use crate::schema::Schema;
use crate::selection::{Direction, Selection};
use crate::transaction::Transaction;
use crate::value::Value;

/// Options for [`Session::apply`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Merge into the previous undo step while inside the batch window
    pub batch: bool,
}

impl ApplyOptions {
    pub fn batched() -> Self {
        Self { batch: true }
    }
}

#[derive(Debug)]
pub struct Session {
    document: Document,
    selection: Selection,
    history: History,
    config: Arc<EditorConfig>,
    ids: IdGenerator,
}

impl Session {
    pub fn new(document: Document, config: EditorConfig) -> Self {
        let history = History::new(config.max_history, config.batch_window());
        let ids = IdGenerator::new(document.document_id());
        Self {
            document,
            selection: Selection::None,
            history,
            config: Arc::new(config),
            ids,
        }
    }

    /// Open a session over a persisted document (array or map form)
    pub fn from_json(
        schema: Arc<Schema>,
        json: &serde_json::Value,
        config: EditorConfig,
    ) -> Result<Self> {
        let document = Document::from_json(schema, json)?;
        Ok(Self::new(document, config))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn get(&self, path: &Path) -> Result<Option<Resolved>> {
        self.document.get(path)
    }

    pub fn inspect(&self, path: &Path) -> Result<Inspection> {
        self.document.inspect(path)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = self.checked(selection);
    }

    /// Open a transaction against the committed document
    pub fn tr(&self) -> Transaction {
        Transaction::new(
            self.document.clone(),
            self.selection.clone(),
            Arc::clone(&self.config),
            self.ids.clone(),
        )
    }

    /// Commit a transaction
    pub fn apply(&mut self, tr: Transaction, options: ApplyOptions) {
        self.apply_at(tr, options, Instant::now());
    }

    /// [`Session::apply`] with an explicit commit time
    #[instrument(skip(self, tr), fields(ops = tr.ops().len(), batch = options.batch))]
    pub fn apply_at(&mut self, tr: Transaction, options: ApplyOptions, now: Instant) {
        let (document, selection, entry, ids) = tr.into_parts();
        self.ids = ids;

        if entry.ops.is_empty() {
            debug!("Empty transaction, selection only");
            self.selection = self.checked(selection);
            return;
        }

        self.document = document;
        self.selection = self.checked(selection);
        self.history.record(entry, options.batch, now);

        info!(
            undo_levels = self.history.undo_levels(),
            nodes = self.document.len(),
            "Transaction committed"
        );
    }

    /// Revert the last committed step. `false` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(entry) = self.history.undo_entry() else {
            return Ok(false);
        };

        let mut document = self.document.clone();
        for op in entry.inverse_ops.iter().rev() {
            document.apply_op(op)?;
        }
        let selection = entry.selection_before.clone();
        let ops = entry.inverse_ops.len();

        self.document = document;
        self.selection = self.checked(selection);
        self.history.step_back();

        info!(ops, undo_levels = self.history.undo_levels(), "Undo");
        Ok(true)
    }

    /// Reapply the last undone step. `false` at the end of history.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(entry) = self.history.redo_entry() else {
            return Ok(false);
        };

        let mut document = self.document.clone();
        for op in &entry.ops {
            document.apply_op(op)?;
        }
        let selection = entry.selection_after.clone();
        let ops = entry.ops.len();

        self.document = document;
        self.selection = self.checked(selection);
        self.history.step_forward();

        info!(ops, redo_levels = self.history.redo_levels(), "Redo");
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ---------------------------------------------------------------------
    // Selection navigation
    // ---------------------------------------------------------------------

    /// Select the node owning the current selection
    pub fn select_parent(&mut self) {
        let parent = self.selection.parent();
        self.set_selection(parent);
    }

    pub fn move_cursor(&mut self, direction: Direction) {
        if let Some(len) = self.extent(&self.selection) {
            self.selection = self.selection.moved(direction, len);
        }
    }

    pub fn expand_selection(&mut self, direction: Direction) {
        if let Some(len) = self.extent(&self.selection) {
            self.selection = self.selection.expanded(direction, len);
        }
    }

    /// The node under a node selection spanning exactly one element
    pub fn selected_node(&self) -> Option<Arc<Node>> {
        let Selection::Node { path, .. } = &self.selection else {
            return None;
        };
        match self.selection.range()? {
            (start, end) if end == start + 1 => match self.get(&path.clone().index(start)) {
                Ok(Some(Resolved::Node(node))) => Some(node),
                _ => None,
            },
            _ => None,
        }
    }

    /// Ordered persisted form
    pub fn to_json(&self) -> serde_json::Value {
        self.document.to_json()
    }

    /// Id-keyed persisted form
    pub fn to_json_map(&self) -> serde_json::Value {
        self.document.to_json_map()
    }

    /// Length of the node array or text a selection ranges over
    fn extent(&self, selection: &Selection) -> Option<usize> {
        let resolved = self.get(selection.path()?).ok()??;
        match (selection, resolved) {
            (Selection::Node { .. }, Resolved::Value(Value::NodeArray(ids))) => Some(ids.len()),
            (Selection::Text { .. }, Resolved::Value(Value::AnnotatedText(text))) => {
                Some(text.len())
            }
            _ => None,
        }
    }

    /// `selection` if it still addresses something, otherwise `None`
    fn checked(&self, selection: Selection) -> Selection {
        let valid = match &selection {
            Selection::None => true,
            Selection::Property { path } => matches!(self.get(path), Ok(Some(_))),
            Selection::Node { .. } | Selection::Text { .. } => {
                match (self.extent(&selection), selection.range()) {
                    (Some(len), Some((_, end))) => end <= len,
                    _ => false,
                }
            }
        };

        if valid {
            selection
        } else {
            debug!(?selection, "Selection no longer valid");
            Selection::None
        }
    }
}
