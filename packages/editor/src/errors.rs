//! Error types for the editor

use thiserror::Error;

/// Schema/caller mismatch. Never recovered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown node type: {0}")]
    UnknownType(String),

    #[error("Unknown property {property} on node type {node_type}")]
    UnknownProperty { node_type: String, property: String },

    #[error("Property {node_type}.{property} references unknown node type {target}")]
    UnknownReference {
        node_type: String,
        property: String,
        target: String,
    },

    #[error("Property {node_type}.{property} must reference annotation types, got {target}")]
    NotAnAnnotationType {
        node_type: String,
        property: String,
        target: String,
    },
}

/// Addressing errors raised by the path resolver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,

    #[error("Path must start with a node id, got {0}")]
    MissingRoot(String),

    #[error("Invalid path segment {segment} at position {position}")]
    InvalidSegment { segment: String, position: usize },

    #[error("Path {0} does not address a node property")]
    NotAProperty(String),

    #[error("Path {0} does not address a node or property")]
    NotInspectable(String),

    #[error("Path {path} does not address a {expected}")]
    Expected { path: String, expected: &'static str },

    #[error("Cannot parse path: {0}")]
    Parse(String),
}

/// Node or document shape violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid node id: {0:?}")]
    InvalidId(String),

    #[error("Node already exists: {0}")]
    DuplicateId(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Document root {0} is missing or is not a document node")]
    InvalidRoot(String),

    #[error("Property {node_id}.{property} is missing")]
    MissingProperty { node_id: String, property: String },

    #[error("Property {node_id}.{property} has a value of the wrong kind")]
    WrongValueKind { node_id: String, property: String },

    #[error("Property {node_id}.{property} cannot reference {target} of type {target_type}")]
    DisallowedReference {
        node_id: String,
        property: String,
        target: String,
        target_type: String,
    },

    #[error("Annotation [{start}, {end}) on {node_id}.{property} is out of bounds")]
    InvalidAnnotation {
        node_id: String,
        property: String,
        start: usize,
        end: usize,
    },

    #[error("Property {0} is read-only")]
    ReadOnly(String),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Addressing error: {0}")]
    Path(#[from] PathError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;
