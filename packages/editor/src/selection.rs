//! # Selection Model
//!
//! A selection is anchored to a path:
//! - `Node`: a range inside a `node_array` property
//! - `Text`: a range inside an `annotated_text` property (grapheme offsets)
//! - `Property`: a single property as a whole
//!
//! Anchor and focus are order independent; equal offsets mean a cursor.
//! Selections are values: every change produces a new one.

use serde::{Deserialize, Serialize};

use crate::path::{Path, PathSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Backward,
    Forward,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Node {
        path: Path,
        anchor_offset: usize,
        focus_offset: usize,
    },
    Text {
        path: Path,
        anchor_offset: usize,
        focus_offset: usize,
    },
    Property {
        path: Path,
    },
}

impl Selection {
    pub fn node(path: Path, anchor_offset: usize, focus_offset: usize) -> Self {
        Selection::Node {
            path,
            anchor_offset,
            focus_offset,
        }
    }

    pub fn text(path: Path, anchor_offset: usize, focus_offset: usize) -> Self {
        Selection::Text {
            path,
            anchor_offset,
            focus_offset,
        }
    }

    pub fn property(path: Path) -> Self {
        Selection::Property { path }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Selection::None => None,
            Selection::Node { path, .. }
            | Selection::Text { path, .. }
            | Selection::Property { path } => Some(path),
        }
    }

    /// `(start, end)` of a node or text selection
    pub fn range(&self) -> Option<(usize, usize)> {
        match self {
            Selection::Node {
                anchor_offset,
                focus_offset,
                ..
            }
            | Selection::Text {
                anchor_offset,
                focus_offset,
                ..
            } => Some((
                (*anchor_offset).min(*focus_offset),
                (*anchor_offset).max(*focus_offset),
            )),
            _ => None,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self.range(), Some((start, end)) if start == end)
    }

    /// Same kind and path, new offsets
    fn with_offsets(&self, anchor: usize, focus: usize) -> Selection {
        match self {
            Selection::Node { path, .. } => Selection::node(path.clone(), anchor, focus),
            Selection::Text { path, .. } => Selection::text(path.clone(), anchor, focus),
            other => other.clone(),
        }
    }

    /// Node selection spanning the node that owns this selection's property.
    ///
    /// `page.body.3.content` (text) becomes `page.body [3, 4)`;
    /// `page.body.2.items` (node) becomes `page.body [2, 3)`.
    /// Too short a path yields `Selection::None`.
    pub fn parent(&self) -> Selection {
        let Some(path) = self.path() else {
            return Selection::None;
        };

        match path.segments() {
            [owner @ .., PathSegment::Property(_), PathSegment::Index(i), PathSegment::Property(_)]
                if !owner.is_empty() =>
            {
                let len = path.len();
                let array: Path = path.segments()[..len - 2].to_vec().into();
                Selection::node(array, *i, i + 1)
            }
            _ => Selection::None,
        }
    }

    /// Collapse a range to its near edge, or step a cursor by one.
    /// Offsets are clamped to `[0, len]`.
    pub fn moved(&self, direction: Direction, len: usize) -> Selection {
        let Some((start, end)) = self.range() else {
            return self.clone();
        };

        let at = match (start == end, direction) {
            (false, Direction::Backward) => start,
            (false, Direction::Forward) => end,
            (true, Direction::Backward) => start.saturating_sub(1),
            (true, Direction::Forward) => start + 1,
        };
        let at = at.min(len);
        self.with_offsets(at, at)
    }

    /// Grow or shrink the focus edge by one, clamped to `[0, len]`
    pub fn expanded(&self, direction: Direction, len: usize) -> Selection {
        let (anchor, focus) = match self {
            Selection::Node {
                anchor_offset,
                focus_offset,
                ..
            }
            | Selection::Text {
                anchor_offset,
                focus_offset,
                ..
            } => (*anchor_offset, *focus_offset),
            other => return other.clone(),
        };

        let focus = match direction {
            Direction::Backward => focus.saturating_sub(1),
            Direction::Forward => (focus + 1).min(len),
        };
        self.with_offsets(anchor, focus)
    }
}
