//! # Transactions
//!
//! A transaction edits a private copy-on-write copy of the committed
//! document. Every change goes through one of three primitives (`set`,
//! `create`, `delete`), each of which records its forward op and exact
//! inverse. The editing verbs are compositions of those primitives that also
//! move the selection.
//!
//! Dropping a transaction discards it; nothing reaches the session until
//! `Session::apply`.
//!
//! Verbs return `Ok(false)` when they do not apply to the current selection.
//! Errors mean the caller passed something the schema rejects.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::annotated_text::{AnnotatedText, Annotation};
use crate::config::EditorConfig;
use crate::document::{Document, Inspection, Resolved};
use crate::errors::{PathError, Result, ValidationError};
use crate::history::HistoryEntry;
use crate::id_generator::IdGenerator;
use crate::node::{is_valid_id, Node, NodeId};
use crate::operations::Op;
use crate::path::Path;
use crate::references::collect_orphans;
use crate::schema::{PropertyType, ReferenceSpec, TextSpec};
use crate::selection::Selection;
use crate::value::Value;

pub struct Transaction {
    document: Document,
    selection: Selection,
    selection_before: Selection,
    ops: Vec<Op>,
    inverse_ops: Vec<Op>,
    config: Arc<EditorConfig>,
    ids: IdGenerator,
}

/// A node array located by path, with the property it lives in
struct NodeArrayTarget {
    property: Path,
    ids: Vec<NodeId>,
    spec: ReferenceSpec,
}

/// Annotated text located by path, with the property it lives in
struct TextTarget {
    property: Path,
    text: AnnotatedText,
    spec: TextSpec,
}

impl Transaction {
    pub fn new(
        document: Document,
        selection: Selection,
        config: Arc<EditorConfig>,
        ids: IdGenerator,
    ) -> Self {
        Self {
            document,
            selection_before: selection.clone(),
            selection,
            ops: Vec::new(),
            inverse_ops: Vec::new(),
            config,
            ids,
        }
    }

    /// Working copy, including every change made so far
    pub fn document(&self) -> &Document {
        &self.document
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

    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn inverse_ops(&self) -> &[Op] {
        &self.inverse_ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Fresh id, unused in the working document
    pub fn new_id(&mut self) -> NodeId {
        loop {
            let id = self.ids.new_id();
            if !self.document.contains(&id) {
                return id;
            }
        }
    }

    // ---------------------------------------------------------------------
    // Primitives
    // ---------------------------------------------------------------------

    /// Replace the value of the property `path` ends in
    pub fn set(&mut self, path: &Path, value: Value) -> Result<()> {
        let (owner, property) = self.document.property_owner(path)?;
        if property == "id" || property == "type" {
            return Err(ValidationError::ReadOnly(path.to_string()).into());
        }

        let property_type = self.document.property_type(&owner.node_type, &property)?;
        if !value.conforms_to(&property_type) {
            return Err(ValidationError::WrongValueKind {
                node_id: owner.id.clone(),
                property,
            }
            .into());
        }
        self.check_value(&owner.id, &property, &property_type, &value)?;

        let previous = self
            .document
            .set_property(&owner.id, &property, value.clone())?;

        let path = Path::node(owner.id.clone()).property(property);
        debug!(path = %path, "set");
        self.ops.push(Op::Set {
            path: path.clone(),
            value,
        });
        self.inverse_ops.push(Op::Set {
            path,
            value: previous,
        });
        Ok(())
    }

    /// Reference targets must have an allowed type; annotations must fit
    /// their text
    fn check_value(
        &self,
        node_id: &str,
        property: &str,
        property_type: &PropertyType,
        value: &Value,
    ) -> Result<()> {
        let allowed: &[String] = match property_type {
            PropertyType::Node(spec) | PropertyType::NodeArray(spec) => &spec.node_types,
            PropertyType::AnnotatedText(spec) => &spec.node_types,
            PropertyType::Primitive(_) => return Ok(()),
        };

        for target in value.references() {
            if let Some(target_node) = self.document.node(target) {
                if !allowed.iter().any(|t| *t == target_node.node_type) {
                    return Err(ValidationError::DisallowedReference {
                        node_id: node_id.to_string(),
                        property: property.to_string(),
                        target: target.to_string(),
                        target_type: target_node.node_type.clone(),
                    }
                    .into());
                }
            }
        }

        if let Value::AnnotatedText(text) = value {
            let len = text.len();
            if let Some(bad) = text
                .annotations
                .iter()
                .find(|a| a.start_offset >= a.end_offset || a.end_offset > len)
            {
                return Err(ValidationError::InvalidAnnotation {
                    node_id: node_id.to_string(),
                    property: property.to_string(),
                    start: bad.start_offset,
                    end: bad.end_offset,
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn create(&mut self, node: Node) -> Result<()> {
        if !is_valid_id(&node.id) {
            return Err(ValidationError::InvalidId(node.id).into());
        }
        if self.document.contains(&node.id) {
            return Err(ValidationError::DuplicateId(node.id).into());
        }
        self.document.schema().validate_node(&node)?;
        self.document.validate_references(&node)?;

        debug!(node_id = %node.id, node_type = %node.node_type, "create");
        self.document.insert_node(node.clone())?;
        // Nodes created earlier in a batch may already point at this one
        if let Err(e) = self.document.validate_referrers(&node.id) {
            self.document.remove_node(&node.id)?;
            return Err(e);
        }
        self.inverse_ops.push(Op::Delete {
            node_id: node.id.clone(),
        });
        self.ops.push(Op::Create { node });
        Ok(())
    }

    /// Remove a node. References to it are left alone.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if id == self.document.document_id() {
            return Err(ValidationError::InvalidRoot(id.to_string()).into());
        }
        let removed = self.document.remove_node(id)?;

        debug!(node_id = %id, "delete");
        self.ops.push(Op::Delete {
            node_id: id.to_string(),
        });
        self.inverse_ops.push(Op::Create {
            node: Node::clone(&removed),
        });
        Ok(())
    }

    /// Delete every node left unreferenced after `seeds` lost a reference.
    /// Returns the number of nodes deleted.
    pub fn delete_orphans(&mut self, seeds: impl IntoIterator<Item = NodeId>) -> Result<usize> {
        let orphans = collect_orphans(&self.document, seeds);
        for id in &orphans {
            self.delete(id)?;
        }
        if !orphans.is_empty() {
            debug!(count = orphans.len(), "Cascade deleted orphans");
        }
        Ok(orphans.len())
    }

    // ---------------------------------------------------------------------
    // Verbs
    // ---------------------------------------------------------------------

    /// Replace the selected node range with `nodes`.
    ///
    /// Nodes not yet in the document are created. Only batch roots (nodes
    /// no other node of the batch references) are spliced into the array,
    /// in the order given. The selection becomes the inserted range.
    pub fn insert_nodes(&mut self, nodes: Vec<Node>) -> Result<bool> {
        let Selection::Node { path, .. } = &self.selection else {
            return Ok(false);
        };
        if nodes.is_empty() {
            return Ok(false);
        }
        let path = path.clone();
        let target = self.node_array_at(&path)?;
        let (start, end) = clamp(self.selection.range(), target.ids.len());

        let roots: Vec<(NodeId, String)> = {
            let batch: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            let referenced: HashSet<&str> = nodes
                .iter()
                .flat_map(|n| n.references())
                .filter(|id| batch.contains(id))
                .collect();
            nodes
                .iter()
                .filter(|n| !referenced.contains(n.id.as_str()))
                .map(|n| (n.id.clone(), n.node_type.clone()))
                .collect()
        };

        if let Some((id, node_type)) = roots.iter().find(|(_, t)| !target.spec.allows(t)) {
            let (owner, property) = self.document.property_owner(&target.property)?;
            return Err(ValidationError::DisallowedReference {
                node_id: owner.id.clone(),
                property,
                target: id.clone(),
                target_type: node_type.clone(),
            }
            .into());
        }
        let root_ids: Vec<NodeId> = roots.into_iter().map(|(id, _)| id).collect();

        for node in nodes {
            if !self.document.contains(&node.id) {
                self.create(node)?;
            }
        }

        let mut ids = target.ids;
        let removed: Vec<NodeId> = ids.splice(start..end, root_ids.iter().cloned()).collect();
        self.set(&target.property, Value::NodeArray(ids))?;
        self.delete_orphans(removed)?;

        self.selection = Selection::node(path, start, start + root_ids.len());
        Ok(true)
    }

    /// Delete the selected nodes or text. A collapsed selection deletes the
    /// element before the cursor and does nothing at offset 0.
    pub fn delete_selection(&mut self) -> Result<bool> {
        match self.selection.clone() {
            Selection::Node { path, .. } => {
                let target = self.node_array_at(&path)?;
                let Some((start, end)) = backspace_range(self.selection.range(), target.ids.len())
                else {
                    return Ok(false);
                };

                let mut ids = target.ids;
                let removed: Vec<NodeId> = ids.drain(start..end).collect();
                self.set(&target.property, Value::NodeArray(ids))?;
                self.delete_orphans(removed)?;

                self.selection = Selection::node(path, start, start);
                Ok(true)
            }
            Selection::Text { path, .. } => {
                let target = self.text_at(&path)?;
                let Some((start, end)) = backspace_range(self.selection.range(), target.text.len())
                else {
                    return Ok(false);
                };

                let edited = target.text.delete(start, end);
                self.replace_text(&target.property, &target.text, edited)?;

                self.selection = Selection::text(path, start, start);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Type or paste over the selected text range
    pub fn insert_text(&mut self, text: &str) -> Result<bool> {
        let Selection::Text { path, .. } = self.selection.clone() else {
            return Ok(false);
        };
        let target = self.text_at(&path)?;
        let (start, end) = clamp(self.selection.range(), target.text.len());

        if text.is_empty() && start == end {
            return Ok(false);
        }
        if !target.spec.allow_newlines && text.contains(|c: char| c == '\n' || c == '\r') {
            debug!(path = %path, "Newlines not allowed here");
            return Ok(false);
        }

        let edited = target.text.insert(start, end, text);
        let grown = edited.len() as i64 - target.text.len() as i64;
        self.replace_text(&target.property, &target.text, edited)?;

        let cursor = (end as i64 + grown).max(start as i64) as usize;
        self.selection = Selection::text(path, cursor, cursor);
        Ok(true)
    }

    /// Toggle an annotation of `annotation_type` over the selected range.
    ///
    /// At most one annotation is active under the range: the first one
    /// overlapping it. An active annotation of the same type is removed, an
    /// active annotation of another type blocks the call. With no active
    /// annotation a new annotation node is created with `properties`.
    ///
    /// A collapsed cursor only edits the properties of the annotation it
    /// sits on, and only for types listed in
    /// [`EditorConfig::collapsed_update_types`].
    pub fn annotate_text(
        &mut self,
        annotation_type: &str,
        properties: IndexMap<String, Value>,
    ) -> Result<bool> {
        let Selection::Text { path, .. } = self.selection.clone() else {
            return Ok(false);
        };
        let target = self.text_at(&path)?;
        if !target.spec.allows(annotation_type) {
            let (owner, property) = self.document.property_owner(&target.property)?;
            return Err(ValidationError::DisallowedReference {
                node_id: owner.id.clone(),
                property,
                target: annotation_type.to_string(),
                target_type: annotation_type.to_string(),
            }
            .into());
        }
        let (start, end) = clamp(self.selection.range(), target.text.len());

        if start == end {
            let Some(active) = target.text.annotations.iter().find(|a| a.touches(start)) else {
                return Ok(false);
            };
            if self.annotation_type(active) != Some(annotation_type)
                || !self.config.allows_collapsed_update(annotation_type)
            {
                return Ok(false);
            }
            if properties.is_empty() {
                return Ok(false);
            }
            let node_id = active.node_id.clone();
            for (name, value) in properties {
                self.set(&Path::node(node_id.clone()).property(name), value)?;
            }
            return Ok(true);
        }

        if let Some(active) = target.text.overlapping(start, end).next() {
            if self.annotation_type(active) != Some(annotation_type) {
                return Ok(false);
            }
            let active = active.clone();
            let mut remaining = target.text.clone();
            remaining.annotations.retain(|a| *a != active);
            self.replace_text(&target.property, &target.text, remaining)?;
            return Ok(true);
        }

        let id = self.new_id();
        let mut node = self.document.schema().instantiate(id.clone(), annotation_type)?;
        node.properties.extend(properties);
        self.create(node)?;

        let mut annotations = target.text.annotations.clone();
        annotations.push(Annotation::new(start, end, id));
        let annotated = AnnotatedText::with_annotations(target.text.text.clone(), annotations);
        self.set(&target.property, Value::AnnotatedText(annotated))?;
        Ok(true)
    }

    /// Split the text node under a collapsed cursor in two. The second half
    /// moves into a new node right after the current one in its node array;
    /// the cursor lands at its start.
    pub fn break_text_node(&mut self) -> Result<bool> {
        let Some((path, offset)) = self.cursor() else {
            return Ok(false);
        };
        let Selection::Node {
            path: array_path,
            anchor_offset: index,
            ..
        } = self.selection.parent()
        else {
            return Ok(false);
        };
        let Some(property) = path.property_name().map(str::to_string) else {
            return Ok(false);
        };

        let text = self.text_at(&path)?;
        let array = self.node_array_at(&array_path)?;
        let Some(current) = array
            .ids
            .get(index)
            .and_then(|id| self.document.node(id))
            .cloned()
        else {
            return Ok(false);
        };

        let (left, right) = text.text.split(offset);
        self.set(&text.property, Value::AnnotatedText(left))?;

        let inserter = self.config.inserter(&current.node_type);
        let id = match inserter {
            Some(inserter) => inserter.insert(self, &current.node_type, right)?,
            None => {
                let id = self.new_id();
                let node = self.continuation_of(&current, id.clone(), &property, right)?;
                self.create(node)?;
                id
            }
        };

        let mut ids = self.node_array_at(&array_path)?.ids;
        ids.insert((index + 1).min(ids.len()), id);
        self.set(&array.property, Value::NodeArray(ids))?;

        let next = array_path.index(index + 1).property(property);
        self.selection = Selection::text(next, 0, 0);
        Ok(true)
    }

    /// Same-type node carrying over primitive properties, with `content`
    /// in `property` and empty references
    fn continuation_of(
        &self,
        current: &Node,
        id: NodeId,
        property: &str,
        content: AnnotatedText,
    ) -> Result<Node> {
        let schema = self.document.schema();
        let descriptor = schema.node_type(&current.node_type)?;
        let mut node = schema.instantiate(id, &current.node_type)?;
        for (name, ty) in &descriptor.properties {
            if let (PropertyType::Primitive(_), Some(value)) = (ty, current.get(name)) {
                node.properties.insert(name.clone(), value.clone());
            }
        }
        node.properties
            .insert(property.to_string(), Value::AnnotatedText(content));
        Ok(node)
    }

    /// Merge the text node under a cursor at offset 0 into its preceding
    /// sibling of the same type. Annotations meeting at the seam merge when
    /// they point at the same node or at equal annotation nodes.
    pub fn join_text_nodes(&mut self) -> Result<bool> {
        let Some((path, 0)) = self.cursor() else {
            return Ok(false);
        };
        let Selection::Node {
            path: array_path,
            anchor_offset: index,
            ..
        } = self.selection.parent()
        else {
            return Ok(false);
        };
        let Some(property) = path.property_name().map(str::to_string) else {
            return Ok(false);
        };
        if index == 0 {
            return Ok(false);
        }

        let array = self.node_array_at(&array_path)?;
        let (Some(prev_id), Some(current_id)) =
            (array.ids.get(index - 1).cloned(), array.ids.get(index).cloned())
        else {
            return Ok(false);
        };
        if prev_id == current_id {
            return Ok(false);
        }
        let (Some(prev), Some(current)) = (
            self.document.node(&prev_id).cloned(),
            self.document.node(&current_id).cloned(),
        ) else {
            return Ok(false);
        };
        if prev.node_type != current.node_type {
            return Ok(false);
        }
        let (Some(left), Some(right)) = (
            prev.get(&property).and_then(Value::as_annotated_text),
            current.get(&property).and_then(Value::as_annotated_text),
        ) else {
            return Ok(false);
        };

        let seam = left.len();
        let joined = AnnotatedText::join_by(left, right, |a, b| {
            a.node_id == b.node_id || self.equivalent_annotations(a, b)
        });

        let prev_property = Path::node(prev_id).property(property.as_str());
        self.set(&prev_property, Value::AnnotatedText(joined))?;

        let mut ids = array.ids;
        ids.remove(index);
        self.set(&array.property, Value::NodeArray(ids))?;
        self.delete_orphans(vec![current_id])?;

        let previous = array_path.index(index - 1).property(property);
        self.selection = Selection::text(previous, seam, seam);
        Ok(true)
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Collapsed text cursor
    fn cursor(&self) -> Option<(Path, usize)> {
        match &self.selection {
            Selection::Text {
                path,
                anchor_offset,
                focus_offset,
            } if anchor_offset == focus_offset => Some((path.clone(), *anchor_offset)),
            _ => None,
        }
    }

    fn annotation_type(&self, annotation: &Annotation) -> Option<&str> {
        self.document
            .node(&annotation.node_id)
            .map(|n| n.node_type.as_str())
    }

    /// Distinct annotation nodes with the same type and data
    fn equivalent_annotations(&self, a: &Annotation, b: &Annotation) -> bool {
        match (
            self.document.node(&a.node_id),
            self.document.node(&b.node_id),
        ) {
            (Some(a), Some(b)) => a.node_type == b.node_type && a.properties == b.properties,
            _ => false,
        }
    }

    /// Set annotated text, then collect annotation nodes it no longer uses
    fn replace_text(
        &mut self,
        property: &Path,
        before: &AnnotatedText,
        after: AnnotatedText,
    ) -> Result<()> {
        let kept: HashSet<&str> = after.annotations.iter().map(|a| a.node_id.as_str()).collect();
        let mut dropped: Vec<NodeId> = Vec::new();
        for a in &before.annotations {
            if !kept.contains(a.node_id.as_str()) && !dropped.contains(&a.node_id) {
                dropped.push(a.node_id.clone());
            }
        }

        self.set(property, Value::AnnotatedText(after))?;
        self.delete_orphans(dropped)?;
        Ok(())
    }

    fn node_array_at(&self, path: &Path) -> Result<NodeArrayTarget> {
        let (node_id, name, spec) = match self.document.inspect(path)? {
            Inspection::Property {
                node_id,
                name,
                property_type: PropertyType::NodeArray(spec),
            } => (node_id, name, spec),
            _ => return Err(expected(path, "node array")),
        };
        let ids = self
            .document
            .node(&node_id)
            .and_then(|n| n.get(&name))
            .and_then(Value::as_node_array)
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default();

        Ok(NodeArrayTarget {
            property: Path::node(node_id).property(name),
            ids,
            spec,
        })
    }

    fn text_at(&self, path: &Path) -> Result<TextTarget> {
        let (node_id, name, spec) = match self.document.inspect(path)? {
            Inspection::Property {
                node_id,
                name,
                property_type: PropertyType::AnnotatedText(spec),
            } => (node_id, name, spec),
            _ => return Err(expected(path, "annotated text")),
        };
        let text = self
            .document
            .node(&node_id)
            .and_then(|n| n.get(&name))
            .and_then(Value::as_annotated_text)
            .cloned()
            .unwrap_or_default();

        Ok(TextTarget {
            property: Path::node(node_id).property(name),
            text,
            spec,
        })
    }

    pub(crate) fn into_parts(self) -> (Document, Selection, HistoryEntry, IdGenerator) {
        let entry = HistoryEntry {
            ops: self.ops,
            inverse_ops: self.inverse_ops,
            selection_before: self.selection_before,
            selection_after: self.selection.clone(),
        };
        (self.document, self.selection, entry, self.ids)
    }
}

fn expected(path: &Path, expected: &'static str) -> crate::EditorError {
    PathError::Expected {
        path: path.to_string(),
        expected,
    }
    .into()
}

/// Selection range clamped to `[0, len]`
fn clamp(range: Option<(usize, usize)>, len: usize) -> (usize, usize) {
    let (start, end) = range.unwrap_or((len, len));
    (start.min(len), end.min(len))
}

/// Range a delete removes: the selection itself, or the element before a
/// collapsed cursor. `None` when there is nothing to remove.
fn backspace_range(range: Option<(usize, usize)>, len: usize) -> Option<(usize, usize)> {
    let (start, end) = clamp(range, len);
    if start < end {
        Some((start, end))
    } else if start > 0 {
        Some((start - 1, start))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Inserter;
    use crate::errors::EditorError;
    use crate::test_support::sample_document;

    fn tr() -> Transaction {
        let doc = sample_document();
        let ids = IdGenerator::new(doc.document_id());
        Transaction::new(doc, Selection::None, Arc::new(EditorConfig::default()), ids)
    }

    fn body() -> Path {
        Path::node("page_1").property("body")
    }

    fn story_content() -> Path {
        Path::node("story_1").property("content")
    }

    fn content_of(tr: &Transaction, id: &str) -> AnnotatedText {
        tr.document()
            .node(id)
            .unwrap()
            .get("content")
            .and_then(Value::as_annotated_text)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_set_records_inverse() {
        let mut tr = tr();
        let title = Path::parse("page_1.body.0.title").unwrap();
        tr.set(&title, Value::String("Intro".into())).unwrap();

        let normalized = Path::node("story_1").property("title");
        assert_eq!(
            tr.ops(),
            &[Op::Set {
                path: normalized.clone(),
                value: Value::String("Intro".into())
            }]
        );
        assert_eq!(
            tr.inverse_ops(),
            &[Op::Set {
                path: normalized,
                value: Value::Null
            }]
        );
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut tr = tr();
        let title = Path::node("story_1").property("title");

        assert!(matches!(
            tr.set(&title, Value::Boolean(true)),
            Err(EditorError::Validation(ValidationError::WrongValueKind { .. }))
        ));
        assert!(matches!(
            tr.set(&Path::node("story_1").property("id"), "other".into()),
            Err(EditorError::Validation(ValidationError::ReadOnly(_)))
        ));
        assert!(matches!(
            tr.set(&body(), Value::NodeArray(vec!["list_item_1".into()])),
            Err(EditorError::Validation(ValidationError::DisallowedReference { .. }))
        ));
        let out_of_bounds = AnnotatedText {
            text: "Hi".into(),
            annotations: vec![Annotation::new(0, 5, "strong_1")],
        };
        assert!(matches!(
            tr.set(&story_content(), Value::AnnotatedText(out_of_bounds)),
            Err(EditorError::Validation(ValidationError::InvalidAnnotation { .. }))
        ));
        assert!(tr.is_empty());
    }

    #[test]
    fn test_create_rejects_invalid_and_duplicate_ids() {
        let mut tr = tr();
        let schema = Arc::clone(tr.document().schema());

        let duplicate = schema.instantiate("story_1", "story").unwrap();
        assert!(matches!(
            tr.create(duplicate),
            Err(EditorError::Validation(ValidationError::DuplicateId(_)))
        ));

        let invalid = schema.instantiate("no spaces", "story").unwrap();
        assert!(matches!(
            tr.create(invalid),
            Err(EditorError::Validation(ValidationError::InvalidId(_)))
        ));
    }

    #[test]
    fn test_create_rejects_disallowed_reference() {
        let mut tr = tr();
        let schema = Arc::clone(tr.document().schema());

        let list = schema
            .instantiate("list_9", "list")
            .unwrap()
            .with("items", Value::NodeArray(vec!["story_1".into()]));
        assert!(matches!(
            tr.create(list),
            Err(EditorError::Validation(ValidationError::DisallowedReference { .. }))
        ));
        assert!(!tr.document().contains("list_9"));
        assert!(tr.is_empty());
    }

    #[test]
    fn test_create_checks_existing_referrers() {
        let mut tr = tr();
        let schema = Arc::clone(tr.document().schema());

        // list_9 points at an id that does not exist yet
        let list = schema
            .instantiate("list_9", "list")
            .unwrap()
            .with("items", Value::NodeArray(vec!["later".into()]));
        tr.create(list).unwrap();

        let story = schema.instantiate("later", "story").unwrap();
        assert!(matches!(
            tr.create(story),
            Err(EditorError::Validation(ValidationError::DisallowedReference { .. }))
        ));
        assert!(!tr.document().contains("later"));
        assert_eq!(tr.ops().len(), 1);

        tr.create(schema.instantiate("later", "list_item").unwrap())
            .unwrap();
        tr.document().validate().unwrap();
    }

    #[test]
    fn test_delete_records_copy_and_keeps_root() {
        let mut tr = tr();
        let original = tr.document().node("list_item_1").unwrap().clone();

        tr.delete("list_item_1").unwrap();
        assert!(!tr.document().contains("list_item_1"));
        assert_eq!(
            tr.inverse_ops(),
            &[Op::Create {
                node: Node::clone(&original)
            }]
        );

        assert!(matches!(
            tr.delete("page_1"),
            Err(EditorError::Validation(ValidationError::InvalidRoot(_)))
        ));
        assert!(tr.delete("list_item_1").is_err());
    }

    #[test]
    fn test_insert_nodes_splices_batch_roots() {
        let mut tr = tr();
        let schema = Arc::clone(tr.document().schema());
        let list = schema
            .instantiate("list_2", "list")
            .unwrap()
            .with("items", Value::NodeArray(vec!["item_a".into()]));
        let item = schema.instantiate("item_a", "list_item").unwrap();

        tr.select(Selection::node(body(), 1, 1));
        assert!(tr.insert_nodes(vec![list, item]).unwrap());

        assert_eq!(
            tr.get(&body()).unwrap(),
            Some(Resolved::Value(Value::NodeArray(vec![
                "story_1".into(),
                "list_2".into(),
                "story_1".into(),
                "list_1".into()
            ])))
        );
        assert!(tr.document().contains("item_a"));
        assert_eq!(tr.selection(), &Selection::node(body(), 1, 2));
    }

    #[test]
    fn test_insert_nodes_replaces_range_and_cascades() {
        let mut tr = tr();
        let story = tr
            .document()
            .schema()
            .instantiate("story_2", "story")
            .unwrap();

        tr.select(Selection::node(body(), 2, 3));
        assert!(tr.insert_nodes(vec![story]).unwrap());

        assert!(!tr.document().contains("list_1"));
        assert!(!tr.document().contains("list_item_1"));
        assert!(tr.document().contains("story_2"));
    }

    #[test]
    fn test_insert_nodes_rejects_disallowed_type() {
        let mut tr = tr();
        let item = tr
            .document()
            .schema()
            .instantiate("item_a", "list_item")
            .unwrap();

        tr.select(Selection::node(body(), 0, 0));
        assert!(tr.insert_nodes(vec![item]).is_err());
    }

    #[test]
    fn test_insert_nodes_needs_node_selection() {
        let mut tr = tr();
        assert!(!tr.insert_nodes(Vec::new()).unwrap());
        tr.select(Selection::text(story_content(), 0, 0));
        let story = tr
            .document()
            .schema()
            .instantiate("story_2", "story")
            .unwrap();
        assert!(!tr.insert_nodes(vec![story]).unwrap());
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let mut tr = tr();
        tr.select(Selection::node(body(), 0, 0));
        assert!(!tr.delete_selection().unwrap());

        tr.select(Selection::text(story_content(), 0, 0));
        assert!(!tr.delete_selection().unwrap());
        assert!(tr.is_empty());
    }

    #[test]
    fn test_backspace_removes_previous_node() {
        let mut tr = tr();
        tr.select(Selection::node(body(), 3, 3));
        assert!(tr.delete_selection().unwrap());

        assert!(!tr.document().contains("list_1"));
        assert_eq!(tr.selection(), &Selection::node(body(), 2, 2));
    }

    #[test]
    fn test_delete_text_collects_annotation_nodes() {
        let mut tr = tr();
        tr.select(Selection::text(story_content(), 5, 11));
        assert!(tr.delete_selection().unwrap());

        let content = content_of(&tr, "story_1");
        assert_eq!(content.text, "Hello");
        assert!(content.annotations.is_empty());
        assert!(!tr.document().contains("strong_1"));
        assert_eq!(tr.selection(), &Selection::text(story_content(), 5, 5));
    }

    #[test]
    fn test_insert_text_moves_cursor() {
        let mut tr = tr();
        tr.select(Selection::text(story_content(), 5, 5));
        assert!(tr.insert_text(", big").unwrap());

        let content = content_of(&tr, "story_1");
        assert_eq!(content.text, "Hello, big world");
        assert_eq!(content.annotations, vec![Annotation::new(11, 16, "strong_1")]);
        assert_eq!(tr.selection(), &Selection::text(story_content(), 10, 10));
    }

    #[test]
    fn test_insert_combining_mark_keeps_annotations_in_bounds() {
        let mut tr = tr();
        tr.select(Selection::text(story_content(), 5, 5));
        assert!(tr.insert_text("\u{301}").unwrap());

        let content = content_of(&tr, "story_1");
        assert_eq!(content.text, "Hello\u{301} world");
        assert_eq!(content.len(), 11);
        assert_eq!(content.annotations, vec![Annotation::new(6, 11, "strong_1")]);
        assert_eq!(tr.selection(), &Selection::text(story_content(), 5, 5));

        tr.select(Selection::text(story_content(), 11, 11));
        assert!(tr.insert_text("!\u{301}").unwrap());
        assert_eq!(tr.selection(), &Selection::text(story_content(), 12, 12));
    }

    #[test]
    fn test_insert_text_rejects_newlines() {
        let mut tr = tr();
        tr.select(Selection::text(story_content(), 5, 5));
        assert!(!tr.insert_text("a\nb").unwrap());
        assert!(tr.is_empty());
    }

    #[test]
    fn test_annotate_toggle_is_idempotent() {
        let mut tr = tr();
        let before = tr.document().clone();
        tr.select(Selection::text(story_content(), 0, 5));

        assert!(tr.annotate_text("strong", IndexMap::new()).unwrap());
        let content = content_of(&tr, "story_1");
        assert_eq!(content.annotations.len(), 2);
        assert_eq!(content.annotations[0].start_offset, 0);
        assert_eq!(content.annotations[0].end_offset, 5);

        assert!(tr.annotate_text("strong", IndexMap::new()).unwrap());
        assert_eq!(tr.document(), &before);
    }

    #[test]
    fn test_annotate_blocked_by_other_type() {
        let mut tr = tr();
        tr.select(Selection::text(story_content(), 4, 8));
        let href: IndexMap<String, Value> = [("href".to_string(), "https://a".into())].into();
        assert!(!tr.annotate_text("link", href).unwrap());
        assert!(tr.is_empty());
    }

    #[test]
    fn test_collapsed_annotate_updates_links_only() {
        let mut tr = tr();
        tr.select(Selection::text(story_content(), 0, 5));
        let href: IndexMap<String, Value> = [("href".to_string(), "https://a".into())].into();
        assert!(tr.annotate_text("link", href).unwrap());
        let link_id = content_of(&tr, "story_1").annotations[0].node_id.clone();

        tr.select(Selection::text(story_content(), 2, 2));
        let href: IndexMap<String, Value> = [("href".to_string(), "https://b".into())].into();
        assert!(tr.annotate_text("link", href).unwrap());
        assert_eq!(
            tr.document().node(&link_id).unwrap().get("href"),
            Some(&Value::String("https://b".into()))
        );

        let ops = tr.ops().len();
        tr.select(Selection::text(story_content(), 2, 2));
        assert!(!tr.annotate_text("link", IndexMap::new()).unwrap());
        assert_eq!(tr.ops().len(), ops);

        tr.select(Selection::text(story_content(), 8, 8));
        assert!(!tr.annotate_text("strong", IndexMap::new()).unwrap());
    }

    #[test]
    fn test_break_and_join_text_nodes() {
        let mut tr = tr();
        let before = tr.document().clone();
        let items = Path::parse("page_1.body.2.items").unwrap();
        tr.select(Selection::text(items.clone().index(0).property("content"), 1, 1));

        assert!(tr.break_text_node().unwrap());
        let ids = tr
            .get(&items)
            .unwrap()
            .and_then(|r| r.as_value().and_then(Value::as_node_array).map(<[_]>::to_vec))
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(content_of(&tr, "list_item_1").text, "O");
        assert_eq!(content_of(&tr, &ids[1]).text, "ne");
        assert_eq!(
            tr.selection(),
            &Selection::text(items.clone().index(1).property("content"), 0, 0)
        );

        assert!(tr.join_text_nodes().unwrap());
        assert_eq!(tr.document(), &before);
        assert_eq!(
            tr.selection(),
            &Selection::text(items.index(0).property("content"), 1, 1)
        );
    }

    #[test]
    fn test_join_requires_cursor_at_start() {
        let mut tr = tr();
        let items = Path::parse("page_1.body.2.items").unwrap();
        tr.select(Selection::text(items.clone().index(1).property("content"), 1, 1));
        assert!(!tr.join_text_nodes().unwrap());

        tr.select(Selection::text(items.index(0).property("content"), 0, 0));
        assert!(!tr.join_text_nodes().unwrap());
    }

    struct Marked;

    impl Inserter for Marked {
        fn insert(
            &self,
            tr: &mut Transaction,
            node_type: &str,
            content: AnnotatedText,
        ) -> Result<NodeId> {
            let node = tr
                .document()
                .schema()
                .instantiate("custom_item", node_type)?
                .with("content", Value::AnnotatedText(content));
            tr.create(node)?;
            Ok("custom_item".to_string())
        }
    }

    #[test]
    fn test_break_uses_registered_inserter() {
        let doc = sample_document();
        let ids = IdGenerator::new(doc.document_id());
        let config = EditorConfig::default().with_inserter("list_item", Marked);
        let mut tr = Transaction::new(doc, Selection::None, Arc::new(config), ids);

        let items = Path::parse("page_1.body.2.items").unwrap();
        tr.select(Selection::text(items.clone().index(1).property("content"), 3, 3));
        assert!(tr.break_text_node().unwrap());

        assert_eq!(
            tr.get(&items.index(2)).unwrap().unwrap().as_node().unwrap().id,
            "custom_item"
        );
        assert_eq!(content_of(&tr, "custom_item").text, "");
    }
}
