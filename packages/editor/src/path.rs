//! # Paths
//!
//! Transient addresses into the document graph: a node id followed by any mix
//! of property names and array indices, e.g. `page_1.body.3.content.text`.
//! Indices shift under mutation, so paths are recomputed rather than stored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PathError;
use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    Id(NodeId),
    Property(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Id(id) => f.write_str(id),
            PathSegment::Property(name) => f.write_str(name),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// Path addressing a single node
    pub fn node(id: impl Into<NodeId>) -> Self {
        Path(vec![PathSegment::Id(id.into())])
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathSegment::Property(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path without its last segment; `None` for the empty path
    pub fn parent(&self) -> Option<Path> {
        let (_, rest) = self.0.split_last()?;
        Some(Path(rest.to_vec()))
    }

    /// Trailing property name, if the path ends in one
    pub fn property_name(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathSegment::Property(name)) => Some(name),
            _ => None,
        }
    }

    /// Parse the dotted form. The first segment is a node id, all-digit
    /// segments are indices, everything else is a property name.
    pub fn parse(source: &str) -> Result<Self, PathError> {
        if source.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        for (position, raw) in source.split('.').enumerate() {
            if raw.is_empty() {
                return Err(PathError::Parse(source.to_string()));
            }
            let is_index = raw.chars().all(|c| c.is_ascii_digit());
            let segment = match (position, is_index) {
                (0, true) => return Err(PathError::MissingRoot(raw.to_string())),
                (0, false) => PathSegment::Id(raw.to_string()),
                (_, true) => PathSegment::Index(
                    raw.parse()
                        .map_err(|_| PathError::Parse(source.to_string()))?,
                ),
                (_, false) => PathSegment::Property(raw.to_string()),
            };
            segments.push(segment);
        }

        Ok(Path(segments))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Path(segments)
    }
}
