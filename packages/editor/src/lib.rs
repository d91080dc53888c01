//! # Quire Editor
//!
//! Structured-document editing engine: a schema-validated graph of typed
//! nodes, addressed by paths, changed only through transactions that record
//! forward and inverse operations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ schema: node types + property descriptors   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ document: Arc<Node> arena + path resolver   │
//! │  - get / inspect                            │
//! │  - validation, traversal, JSON forms        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ transaction: set / create / delete + verbs  │
//! │  - annotated text algebra                   │
//! │  - reference-counted cascade deletion       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: committed document, selection,     │
//! │          undo/redo history                  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Transactions are the only writers**: every change records its inverse
//! 2. **Snapshots are cheap**: nodes are shared until written
//! 3. **Paths are transient**: recompute them after every change
//! 4. **Inapplicable verbs are no-ops**: they return `Ok(false)`, not errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quire_editor::{ApplyOptions, EditorConfig, Path, Selection, Session};
//!
//! let mut session = Session::from_json(schema, &json, EditorConfig::default())?;
//!
//! let mut tr = session.tr();
//! tr.select(Selection::text(Path::parse("page_1.body.0.content")?, 5, 5));
//! tr.insert_text(", world")?;
//! session.apply(tr, ApplyOptions::batched());
//!
//! session.undo()?;
//! ```

pub mod annotated_text;
pub mod config;
pub mod document;
pub mod errors;
pub mod history;
pub mod id_generator;
pub mod node;
pub mod operations;
pub mod path;
pub mod references;
pub mod schema;
pub mod selection;
pub mod session;
pub mod transaction;
pub mod traversal;
pub mod value;

pub use annotated_text::{AnnotatedText, Annotation};
pub use config::{EditorConfig, Inserter};
pub use document::{Document, Inspection, Resolved};
pub use errors::{EditorError, PathError, Result, SchemaError, ValidationError};
pub use history::{History, HistoryEntry};
pub use node::{Node, NodeId};
pub use operations::Op;
pub use path::{Path, PathSegment};
pub use references::{collect_orphans, count_references};
pub use schema::{NodeKind, NodeType, PrimitiveType, PropertyType, ReferenceSpec, Schema, TextSpec};
pub use selection::{Direction, Selection};
pub use session::{ApplyOptions, Session};
pub use transaction::Transaction;
pub use traversal::traverse;
pub use value::Value;
