//! # Annotated Text
//!
//! Text plus a list of ranges, each pointing at an annotation node. All
//! offsets count extended grapheme clusters, so a ZWJ emoji sequence is one
//! unit.
//!
//! The transformations here are pure. Every result keeps its annotations in
//! canonical order `(start_offset, end_offset, node_id)` and drops ranges
//! that collapsed to zero width.
//!
//! ## Replacement cases
//!
//! `insert(start, end, replacement)` classifies each annotation `[s, e)`,
//! first match wins. `Δ` is the change in grapheme length of the whole text,
//! which can be less than `len(replacement) - (end - start)` when the
//! replacement fuses with a neighbour:
//!
//! ```text
//! 1. e <= start                         unchanged
//! 2. s >= end                           [s + Δ, e + Δ)
//! 3. s <= start && e >= end             [s, e + Δ)
//! 4. start <= s && e <= end             removed
//! 5. start <= s < end < e               [start, e + Δ)
//! 6. s < start < e <= end               [s, start)
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::node::NodeId;

/// Range over annotated text, pointing at an annotation node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub start_offset: usize,
    pub end_offset: usize,
    pub node_id: NodeId,
}

impl Annotation {
    pub fn new(start_offset: usize, end_offset: usize, node_id: impl Into<NodeId>) -> Self {
        Self {
            start_offset,
            end_offset,
            node_id: node_id.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the range shares at least one unit with `[start, end)`
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start_offset < end && self.end_offset > start
    }

    /// True if a collapsed cursor at `offset` sits on this range,
    /// edges included
    pub fn touches(&self, offset: usize) -> bool {
        self.start_offset <= offset && offset <= self.end_offset
    }

    fn shifted(&self, delta: i64) -> Self {
        Self::new(
            shift(self.start_offset, delta),
            shift(self.end_offset, delta),
            self.node_id.clone(),
        )
    }
}

fn shift(offset: usize, delta: i64) -> usize {
    (offset as i64 + delta).max(0) as usize
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedText {
    pub text: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl AnnotatedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotations(text: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self {
            text: text.into(),
            annotations,
        }
        .normalized()
    }

    /// Length in grapheme clusters
    pub fn len(&self) -> usize {
        grapheme_len(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text between two grapheme offsets
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let from = byte_index(&self.text, start);
        let to = byte_index(&self.text, end.max(start));
        &self.text[from..to]
    }

    /// Annotations sharing at least one unit with `[start, end)`
    pub fn overlapping(&self, start: usize, end: usize) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.overlaps(start, end))
    }

    /// Partition at grapheme offset `at`. Annotations straddling the cut are
    /// duplicated into both halves, keeping the same annotation node.
    pub fn split(&self, at: usize) -> (AnnotatedText, AnnotatedText) {
        let at = at.min(self.len());
        let cut = byte_index(&self.text, at);

        let mut left = AnnotatedText::new(&self.text[..cut]);
        let mut right = AnnotatedText::new(&self.text[cut..]);

        for a in &self.annotations {
            if a.end_offset <= at {
                left.annotations.push(a.clone());
            } else if a.start_offset >= at {
                right.annotations.push(a.shifted(-(at as i64)));
            } else {
                left.annotations
                    .push(Annotation::new(a.start_offset, at, a.node_id.clone()));
                right
                    .annotations
                    .push(Annotation::new(0, a.end_offset - at, a.node_id.clone()));
            }
        }

        (left.normalized(), right.normalized())
    }

    /// Concatenate, merging ranges of the same annotation node that meet at
    /// the seam.
    pub fn join(left: &AnnotatedText, right: &AnnotatedText) -> AnnotatedText {
        Self::join_by(left, right, |a, b| a.node_id == b.node_id)
    }

    /// Concatenate, merging ranges that meet at the seam and that `same`
    /// considers equivalent. The merged range keeps the left annotation's node.
    pub fn join_by<F>(left: &AnnotatedText, right: &AnnotatedText, same: F) -> AnnotatedText
    where
        F: Fn(&Annotation, &Annotation) -> bool,
    {
        let seam = left.len();
        let text = format!("{}{}", left.text, right.text);
        // Graphemes can fuse across the seam, so the joined text may be shorter
        let joined_len = grapheme_len(&text);
        let mut annotations = left.annotations.clone();
        let mut merged = vec![false; annotations.len()];

        for r in &right.annotations {
            let r = r.shifted(seam as i64);
            let partner = if r.start_offset == seam {
                (0..merged.len()).find(|&i| {
                    !merged[i] && annotations[i].end_offset == seam && same(&annotations[i], &r)
                })
            } else {
                None
            };

            match partner {
                Some(i) => {
                    annotations[i].end_offset = r.end_offset;
                    merged[i] = true;
                }
                None => annotations.push(r),
            }
        }

        for a in &mut annotations {
            a.start_offset = a.start_offset.min(joined_len);
            a.end_offset = a.end_offset.min(joined_len);
        }

        AnnotatedText { text, annotations }.normalized()
    }

    /// Replace `[start, end)` with `replacement`, re-deriving every range
    pub fn insert(&self, start: usize, end: usize, replacement: &str) -> AnnotatedText {
        let len = self.len();
        let (start, end) = (start.min(end).min(len), end.max(start).min(len));

        let mut text = String::with_capacity(self.text.len() + replacement.len());
        text.push_str(&self.text[..byte_index(&self.text, start)]);
        text.push_str(replacement);
        text.push_str(&self.text[byte_index(&self.text, end)..]);

        // Measured on the result: a combining mark or ZWJ continuation fuses
        // with its neighbour and adds no grapheme of its own.
        let new_len = grapheme_len(&text);
        let delta = new_len as i64 - len as i64;

        let annotations = self
            .annotations
            .iter()
            .filter_map(|a| {
                let (s, e) = (a.start_offset, a.end_offset);
                let (s, e) = if e <= start {
                    (s, e)
                } else if s >= end {
                    (shift(s, delta), shift(e, delta))
                } else if s <= start && e >= end {
                    (s, shift(e, delta))
                } else if start <= s && e <= end {
                    return None;
                } else if s >= start && e > end {
                    (start, shift(e, delta))
                } else {
                    // s < start < e <= end
                    (s, start)
                };
                let (s, e) = (s.min(new_len), e.min(new_len));
                (s < e).then(|| Annotation::new(s, e, a.node_id.clone()))
            })
            .collect();

        AnnotatedText { text, annotations }.normalized()
    }

    /// Remove `[start, end)`. Edges inside the range collapse to `start`.
    pub fn delete(&self, start: usize, end: usize) -> AnnotatedText {
        self.insert(start, end, "")
    }

    fn normalized(mut self) -> Self {
        self.annotations.retain(|a| a.start_offset < a.end_offset);
        self.annotations.sort_by(|a, b| {
            (a.start_offset, a.end_offset, &a.node_id).cmp(&(
                b.start_offset,
                b.end_offset,
                &b.node_id,
            ))
        });
        self
    }
}

pub fn grapheme_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Byte index of grapheme offset `offset`, clamped to the end of `text`
fn byte_index(text: &str, offset: usize) -> usize {
    text.grapheme_indices(true)
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
