//! Editor configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::annotated_text::AnnotatedText;
use crate::errors::Result;
use crate::node::NodeId;
use crate::transaction::Transaction;

pub const DEFAULT_BATCH_WINDOW_MS: u64 = 1000;
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Factory for the "default" node of a type, used by generic verbs such as
/// `break_text_node` when a text node is split in two.
pub trait Inserter: Send + Sync {
    /// Create the node inside `tr` holding `content` and return its id.
    /// The caller splices the id into the surrounding node array.
    fn insert(&self, tr: &mut Transaction, node_type: &str, content: AnnotatedText)
        -> Result<NodeId>;
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Consecutive batched transactions started within this window merge
    /// into one undo step
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,

    /// Maximum number of undo levels (0 = unlimited)
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Annotation types whose data may be edited from a collapsed cursor
    #[serde(default = "default_collapsed_update_types")]
    pub collapsed_update_types: Vec<String>,

    /// Inserters keyed by node type
    #[serde(skip)]
    pub inserters: IndexMap<String, Arc<dyn Inserter>>,
}

fn default_batch_window_ms() -> u64 {
    DEFAULT_BATCH_WINDOW_MS
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

fn default_collapsed_update_types() -> Vec<String> {
    vec!["link".to_string()]
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn with_inserter(
        mut self,
        node_type: impl Into<String>,
        inserter: impl Inserter + 'static,
    ) -> Self {
        self.inserters.insert(node_type.into(), Arc::new(inserter));
        self
    }

    pub fn inserter(&self, node_type: &str) -> Option<Arc<dyn Inserter>> {
        self.inserters.get(node_type).cloned()
    }

    pub fn allows_collapsed_update(&self, annotation_type: &str) -> bool {
        self.collapsed_update_types.iter().any(|t| t == annotation_type)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: default_batch_window_ms(),
            max_history: default_max_history(),
            collapsed_update_types: default_collapsed_update_types(),
            inserters: IndexMap::new(),
        }
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("batch_window_ms", &self.batch_window_ms)
            .field("max_history", &self.max_history)
            .field("collapsed_update_types", &self.collapsed_update_types)
            .field("inserters", &self.inserters.keys().collect::<Vec<_>>())
            .finish()
    }
}
