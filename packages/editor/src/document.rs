//! # Document Store
//!
//! A document is a map from node id to node plus a designated root. The map
//! is a persistent `im::OrdMap` and nodes are held behind `Arc`, so cloning a
//! document is O(1) and a clone taken before a change keeps seeing the old
//! nodes. Writes go through `Arc::make_mut`, which copies a node only while
//! another snapshot still shares it.
//!
//! ## Path resolution
//!
//! `get` walks a path with an explicit mode machine driven by the schema:
//!
//! ```text
//! Node ──property──▶ Scalar | ValueArray | NodeArray | Text | Node (deref)
//! NodeArray ──index──▶ Node
//! ValueArray ──index──▶ Value
//! Text ──"text"──▶ String        Text ──"annotations"──▶ Annotations
//! Annotations ──index──▶ Annotation ──node_id|start_offset|end_offset──▶ leaf
//! ```

use std::sync::Arc;

use im::OrdMap;
use tracing::warn;

use crate::annotated_text::{AnnotatedText, Annotation};
use crate::errors::{PathError, Result, SchemaError, ValidationError};
use crate::node::{Node, NodeId};
use crate::operations::Op;
use crate::path::{Path, PathSegment};
use crate::schema::{NodeKind, NodeType, PropertyType, Schema};
use crate::traversal;
use crate::value::Value;

/// Schema-validated graph of nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    schema: Arc<Schema>,
    document_id: NodeId,
    nodes: OrdMap<NodeId, Arc<Node>>,
}

/// Result of resolving a path
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Node(Arc<Node>),
    Value(Value),
    Text(String),
    Annotations(Vec<Annotation>),
    Annotation(Annotation),
    NodeId(NodeId),
    Offset(usize),
}

impl Resolved {
    pub fn as_node(&self) -> Option<&Arc<Node>> {
        match self {
            Resolved::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Metadata about the location a path addresses
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    Property {
        node_id: NodeId,
        name: String,
        property_type: PropertyType,
    },
    Node {
        id: NodeId,
        node_type: String,
        descriptor: NodeType,
    },
}

enum Mode<'a> {
    Node(&'a Arc<Node>),
    Scalar(&'a Value),
    ValueArray(&'a Value),
    NodeArray(&'a [NodeId]),
    Text(&'a AnnotatedText),
    Annotations(&'a [Annotation]),
    Annotation(&'a Annotation),
    Leaf(Resolved),
}

impl Mode<'_> {
    fn into_resolved(self) -> Resolved {
        match self {
            Mode::Node(node) => Resolved::Node(Arc::clone(node)),
            Mode::Scalar(value) | Mode::ValueArray(value) => Resolved::Value(value.clone()),
            Mode::NodeArray(ids) => Resolved::Value(Value::NodeArray(ids.to_vec())),
            Mode::Text(text) => Resolved::Value(Value::AnnotatedText(text.clone())),
            Mode::Annotations(list) => Resolved::Annotations(list.to_vec()),
            Mode::Annotation(a) => Resolved::Annotation(a.clone()),
            Mode::Leaf(resolved) => resolved,
        }
    }
}

impl Document {
    /// Build and validate a document
    pub fn new(
        schema: Arc<Schema>,
        document_id: impl Into<NodeId>,
        nodes: impl IntoIterator<Item = Node>,
    ) -> Result<Self> {
        let mut document = Self {
            schema,
            document_id: document_id.into(),
            nodes: OrdMap::new(),
        };
        for node in nodes {
            document.insert_node(node)?;
        }

        if let Err(e) = document.validate() {
            warn!(document_id = %document.document_id, error = %e, "Rejected invalid document");
            return Err(e);
        }
        Ok(document)
    }

    /// Read either persisted form: `nodes` as an ordered array or as a map
    /// keyed by node id.
    pub fn from_json(schema: Arc<Schema>, json: &serde_json::Value) -> Result<Self> {
        let document_id = json
            .get("document_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::Malformed("missing document_id".into()))?;

        let nodes = match json.get("nodes") {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|raw| Node::from_json(&schema, raw))
                .collect::<Result<Vec<_>>>()?,
            Some(serde_json::Value::Object(map)) => map
                .iter()
                .map(|(key, raw)| {
                    let node = Node::from_json(&schema, raw)?;
                    if &node.id != key {
                        return Err(ValidationError::Malformed(format!(
                            "node keyed {key} has id {}",
                            node.id
                        ))
                        .into());
                    }
                    Ok(node)
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(ValidationError::Malformed("missing nodes".into()).into()),
        };

        Self::new(schema, document_id, nodes)
    }

    /// Ordered persisted form (leaves first, root last, unreachable nodes pruned)
    pub fn to_json(&self) -> serde_json::Value {
        traversal::to_json(self)
    }

    /// Id-keyed persisted form
    pub fn to_json_map(&self) -> serde_json::Value {
        traversal::to_json_map(self)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn root(&self) -> Option<&Arc<Node>> {
        self.nodes.get(&self.document_id)
    }

    pub fn node(&self, id: &str) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn property_type(&self, node_type: &str, property: &str) -> Result<PropertyType> {
        Ok(self.schema.property_type(node_type, property)?.into_owned())
    }

    /// Resolve a path to a value. `Ok(None)` when the path is well formed but
    /// leads nowhere (missing node, index out of range, empty reference).
    pub fn get(&self, path: &Path) -> Result<Option<Resolved>> {
        let mut segments = path.segments().iter().enumerate();

        let mut mode = match segments.next() {
            None => return Err(PathError::Empty.into()),
            Some((_, PathSegment::Id(id))) => match self.nodes.get(id) {
                Some(node) => Mode::Node(node),
                None => return Ok(None),
            },
            Some((_, other)) => return Err(PathError::MissingRoot(other.to_string()).into()),
        };

        for (position, segment) in segments {
            mode = match self.step(mode, segment, position)? {
                Some(next) => next,
                None => return Ok(None),
            };
        }

        Ok(Some(mode.into_resolved()))
    }

    fn step<'a>(
        &'a self,
        mode: Mode<'a>,
        segment: &PathSegment,
        position: usize,
    ) -> Result<Option<Mode<'a>>> {
        let next = match (mode, segment) {
            (Mode::Node(node), PathSegment::Property(name)) => return self.enter(node, name),
            (Mode::NodeArray(ids), PathSegment::Index(i)) => {
                ids.get(*i).and_then(|id| self.nodes.get(id)).map(Mode::Node)
            }
            (Mode::ValueArray(value), PathSegment::Index(i)) => {
                value.element(*i).map(|v| Mode::Leaf(Resolved::Value(v)))
            }
            (Mode::Text(text), PathSegment::Property(name)) if name == "text" => {
                Some(Mode::Leaf(Resolved::Text(text.text.clone())))
            }
            (Mode::Text(text), PathSegment::Property(name)) if name == "annotations" => {
                Some(Mode::Annotations(&text.annotations))
            }
            (Mode::Annotations(list), PathSegment::Index(i)) => list.get(*i).map(Mode::Annotation),
            (Mode::Annotation(a), PathSegment::Property(name)) => match name.as_str() {
                "node_id" => Some(Mode::Leaf(Resolved::NodeId(a.node_id.clone()))),
                "start_offset" => Some(Mode::Leaf(Resolved::Offset(a.start_offset))),
                "end_offset" => Some(Mode::Leaf(Resolved::Offset(a.end_offset))),
                _ => return Err(invalid(segment, position)),
            },
            _ => return Err(invalid(segment, position)),
        };
        Ok(next)
    }

    fn enter<'a>(&'a self, node: &'a Arc<Node>, name: &str) -> Result<Option<Mode<'a>>> {
        let property_type = self.schema.property_type(&node.node_type, name)?;
        match name {
            "id" => return Ok(Some(Mode::Leaf(Resolved::Value(node.id.clone().into())))),
            "type" => {
                return Ok(Some(Mode::Leaf(Resolved::Value(
                    node.node_type.clone().into(),
                ))))
            }
            _ => {}
        }

        let Some(value) = node.properties.get(name) else {
            return Ok(None);
        };

        let mode = match (&*property_type, value) {
            (PropertyType::Node(_), Value::Node(Some(id))) => match self.nodes.get(id) {
                Some(target) => Mode::Node(target),
                None => return Ok(None),
            },
            (PropertyType::Node(_), _) => return Ok(None),
            (PropertyType::NodeArray(_), Value::NodeArray(ids)) => Mode::NodeArray(ids),
            (PropertyType::AnnotatedText(_), Value::AnnotatedText(text)) => Mode::Text(text),
            (PropertyType::Primitive(p), value) if p.is_array() => Mode::ValueArray(value),
            (_, value) => Mode::Scalar(value),
        };
        Ok(Some(mode))
    }

    /// Describe what a path points at: the terminal property when the parent
    /// is a node, otherwise the terminal node itself.
    pub fn inspect(&self, path: &Path) -> Result<Inspection> {
        if path.is_empty() {
            return Err(PathError::Empty.into());
        }

        if let (Some(parent), Some(name)) = (path.parent(), path.property_name()) {
            if !parent.is_empty() {
                if let Some(Resolved::Node(node)) = self.get(&parent)? {
                    let property_type = self.property_type(&node.node_type, name)?;
                    return Ok(Inspection::Property {
                        node_id: node.id.clone(),
                        name: name.to_string(),
                        property_type,
                    });
                }
            }
        }

        match self.get(path)? {
            Some(Resolved::Node(node)) => Ok(Inspection::Node {
                id: node.id.clone(),
                node_type: node.node_type.clone(),
                descriptor: self.schema.node_type(&node.node_type)?.clone(),
            }),
            _ => Err(PathError::NotInspectable(path.to_string()).into()),
        }
    }

    /// The node owning the property a path ends in
    pub fn property_owner(&self, path: &Path) -> Result<(Arc<Node>, String)> {
        let name = path
            .property_name()
            .ok_or_else(|| PathError::NotAProperty(path.to_string()))?;
        let parent = path
            .parent()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PathError::NotAProperty(path.to_string()))?;

        match self.get(&parent)? {
            Some(Resolved::Node(node)) => {
                self.schema.property_type(&node.node_type, name)?;
                Ok((node, name.to_string()))
            }
            Some(_) => Err(PathError::NotAProperty(path.to_string()).into()),
            None => Err(ValidationError::NodeNotFound(parent.to_string()).into()),
        }
    }

    /// Whole-document validation: root, node shapes and reference targets
    pub fn validate(&self) -> Result<()> {
        match self.root() {
            Some(root) if self.schema.node_type(&root.node_type)?.kind == NodeKind::Document => {}
            _ => return Err(ValidationError::InvalidRoot(self.document_id.clone()).into()),
        }

        for node in self.nodes.values() {
            self.schema.validate_node(node)?;
            self.validate_references(node)?;
        }
        Ok(())
    }

    /// Every existing target of `node`'s references has an allowed type
    pub(crate) fn validate_references(&self, node: &Node) -> Result<()> {
        let descriptor = self.schema.node_type(&node.node_type)?;
        for (name, value) in &node.properties {
            let property_type = descriptor.properties.get(name).ok_or_else(|| {
                SchemaError::UnknownProperty {
                    node_type: node.node_type.clone(),
                    property: name.clone(),
                }
            })?;

            let allowed: &[String] = match property_type {
                PropertyType::Node(spec) | PropertyType::NodeArray(spec) => &spec.node_types,
                PropertyType::AnnotatedText(spec) => &spec.node_types,
                PropertyType::Primitive(_) => continue,
            };

            for target in value.references() {
                // Dangling ids are tolerated; traversal prunes them.
                if let Some(target_node) = self.nodes.get(target) {
                    if !allowed.iter().any(|t| *t == target_node.node_type) {
                        return Err(ValidationError::DisallowedReference {
                            node_id: node.id.clone(),
                            property: name.clone(),
                            target: target.to_string(),
                            target_type: target_node.node_type.clone(),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-check every node that already points at `id`
    pub(crate) fn validate_referrers(&self, id: &str) -> Result<()> {
        for node in self.nodes.values().filter(|n| n.references().any(|r| r == id)) {
            self.validate_references(node)?;
        }
        Ok(())
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(ValidationError::DuplicateId(node.id).into());
        }
        self.nodes.insert(node.id.clone(), Arc::new(node));
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, id: &str) -> Result<Arc<Node>> {
        self.nodes
            .remove(id)
            .ok_or_else(|| ValidationError::NodeNotFound(id.to_string()).into())
    }

    /// Copy-on-write property update; returns the previous value
    pub(crate) fn set_property(&mut self, id: &str, property: &str, value: Value) -> Result<Value> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ValidationError::NodeNotFound(id.to_string()))?;
        let previous = Arc::make_mut(node)
            .properties
            .insert(property.to_string(), value)
            .unwrap_or(Value::Null);
        Ok(previous)
    }

    /// Replay a recorded op (undo/redo)
    pub fn apply_op(&mut self, op: &Op) -> Result<()> {
        match op {
            Op::Set { path, value } => {
                let (node, property) = self.property_owner(path)?;
                self.set_property(&node.id, &property, value.clone())?;
            }
            Op::Create { node } => self.insert_node(node.clone())?,
            Op::Delete { node_id } => {
                self.remove_node(node_id)?;
            }
        }
        Ok(())
    }
}

fn invalid(segment: &PathSegment, position: usize) -> crate::EditorError {
    PathError::InvalidSegment {
        segment: segment.to_string(),
        position,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_document, sample_schema};

    #[test]
    fn test_get_walks_node_arrays() {
        let doc = sample_document();

        let body = doc.get(&Path::parse("page_1.body").unwrap()).unwrap().unwrap();
        assert_eq!(
            body,
            Resolved::Value(Value::NodeArray(vec![
                "story_1".into(),
                "story_1".into(),
                "list_1".into()
            ]))
        );

        let list = doc.get(&Path::parse("page_1.body.2").unwrap()).unwrap().unwrap();
        assert_eq!(list.as_node().unwrap().id, "list_1");

        let item = doc
            .get(&Path::parse("page_1.body.2.items.1").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(item.as_node().unwrap().id, "list_item_2");
    }

    #[test]
    fn test_get_into_annotated_text() {
        let doc = sample_document();
        let base = Path::node("story_1").property("content");

        assert_eq!(
            doc.get(&base.clone().property("text")).unwrap(),
            Some(Resolved::Text("Hello world".into()))
        );
        assert_eq!(
            doc.get(&base.clone().property("annotations").index(0).property("end_offset"))
                .unwrap(),
            Some(Resolved::Offset(11))
        );
        assert_eq!(
            doc.get(&base.clone().property("annotations").index(0).property("node_id"))
                .unwrap(),
            Some(Resolved::NodeId("strong_1".into()))
        );

        let bad = base.property("annotations").index(0).property("colour");
        assert!(matches!(
            doc.get(&bad),
            Err(crate::EditorError::Path(PathError::InvalidSegment { position: 4, .. }))
        ));
    }

    #[test]
    fn test_get_dereferences_single_reference() {
        let doc = sample_document();
        let title = doc
            .get(&Path::parse("page_1.cover.content.text").unwrap())
            .unwrap();
        assert_eq!(title, Some(Resolved::Text("Cover".into())));
    }

    #[test]
    fn test_get_missing_and_invalid() {
        let doc = sample_document();
        assert_eq!(doc.get(&Path::node("nope")).unwrap(), None);
        assert_eq!(doc.get(&Path::parse("page_1.body.9").unwrap()).unwrap(), None);
        assert!(matches!(
            doc.get(&Path::default()),
            Err(crate::EditorError::Path(PathError::Empty))
        ));
        assert!(matches!(
            doc.get(&Path::parse("page_1.footer").unwrap()),
            Err(crate::EditorError::Schema(SchemaError::UnknownProperty { .. }))
        ));
        assert!(matches!(
            doc.get(&Path::parse("page_1.title.0").unwrap()),
            Err(crate::EditorError::Path(PathError::InvalidSegment { .. }))
        ));
    }

    #[test]
    fn test_get_implicit_properties() {
        let doc = sample_document();
        assert_eq!(
            doc.get(&Path::parse("page_1.body.2.type").unwrap()).unwrap(),
            Some(Resolved::Value(Value::String("list".into())))
        );
    }

    #[test]
    fn test_inspect() {
        let doc = sample_document();

        match doc.inspect(&Path::parse("page_1.body").unwrap()).unwrap() {
            Inspection::Property {
                node_id,
                name,
                property_type,
            } => {
                assert_eq!(node_id, "page_1");
                assert_eq!(name, "body");
                assert!(property_type.is_node_array());
            }
            other => panic!("Expected property, got {:?}", other),
        }

        match doc.inspect(&Path::parse("page_1.body.2").unwrap()).unwrap() {
            Inspection::Node { id, node_type, .. } => {
                assert_eq!(id, "list_1");
                assert_eq!(node_type, "list");
            }
            other => panic!("Expected node, got {:?}", other),
        }

        assert!(doc
            .inspect(&Path::parse("story_1.content.text").unwrap())
            .is_err());
    }

    #[test]
    fn test_validation_rejects_disallowed_reference() {
        let schema = Arc::new(sample_schema());
        let page = schema
            .instantiate("page_1", "page")
            .unwrap()
            .with("body", Value::NodeArray(vec!["item".into()]));
        let item = schema.instantiate("item", "list_item").unwrap();

        let err = Document::new(schema, "page_1", vec![page, item]).unwrap_err();
        assert!(matches!(
            err,
            crate::EditorError::Validation(ValidationError::DisallowedReference { .. })
        ));
    }

    #[test]
    fn test_validation_tolerates_dangling_reference() {
        let schema = Arc::new(sample_schema());
        let page = schema
            .instantiate("page_1", "page")
            .unwrap()
            .with("body", Value::NodeArray(vec!["ghost".into()]));

        assert!(Document::new(schema, "page_1", vec![page]).is_ok());
    }

    #[test]
    fn test_root_must_be_document_kind() {
        let schema = Arc::new(sample_schema());
        let story = schema.instantiate("story_1", "story").unwrap();
        assert!(matches!(
            Document::new(schema, "story_1", vec![story]),
            Err(crate::EditorError::Validation(ValidationError::InvalidRoot(_)))
        ));
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut doc = sample_document();
        let snapshot = doc.clone();

        doc.set_property("story_1", "title", Value::String("Changed".into()))
            .unwrap();

        assert_eq!(
            snapshot.node("story_1").unwrap().get("title"),
            Some(&Value::Null)
        );
        assert_eq!(
            doc.node("story_1").unwrap().get("title"),
            Some(&Value::String("Changed".into()))
        );
    }

    #[test]
    fn test_snapshots_share_untouched_nodes() {
        let mut doc = sample_document();
        let snapshot = doc.clone();

        doc.set_property("story_1", "title", Value::String("Changed".into()))
            .unwrap();
        doc.remove_node("cover_1").unwrap();

        assert!(Arc::ptr_eq(
            doc.node("list_1").unwrap(),
            snapshot.node("list_1").unwrap()
        ));
        assert!(!Arc::ptr_eq(
            doc.node("story_1").unwrap(),
            snapshot.node("story_1").unwrap()
        ));
        assert!(snapshot.contains("cover_1"));
        assert_eq!(snapshot.len(), doc.len() + 1);
    }

    #[test]
    fn test_json_forms_are_interconvertible() {
        let doc = sample_document();
        let schema = Arc::clone(doc.schema());

        let from_array = Document::from_json(Arc::clone(&schema), &doc.to_json()).unwrap();
        let from_map = Document::from_json(schema, &doc.to_json_map()).unwrap();

        assert_eq!(from_array, doc);
        assert_eq!(from_map, doc);
    }

    fn arb_path() -> impl proptest::strategy::Strategy<Value = Path> {
        use proptest::prelude::*;

        let templates = vec![
            "page_1",
            "page_1.title",
            "page_1.cover",
            "page_1.cover.content.text",
            "page_1.body.{i}",
            "page_1.body.{i}.content",
            "page_1.body.{i}.content.annotations.{i}",
            "page_1.body.{i}.content.annotations.{i}.node_id",
            "page_1.body.{i}.items.{i}.content.text",
            "story_1.content.annotations",
            "list_1.items.{i}",
            "list_item_2.nested",
            "strong_1.type",
            "missing_1",
        ];
        (prop::sample::select(templates), 0usize..4)
            .prop_map(|(template, i)| Path::parse(&template.replace("{i}", &i.to_string())))
            .prop_filter_map("path must parse", |path| path.ok())
    }

    proptest::proptest! {
        #[test]
        fn prop_get_is_deterministic(path in arb_path()) {
            let doc = sample_document();
            let snapshot = doc.clone();

            let first = doc.get(&path).map_err(|e| e.to_string());
            let second = doc.get(&path).map_err(|e| e.to_string());
            proptest::prop_assert_eq!(&first, &second);
            proptest::prop_assert_eq!(first, snapshot.get(&path).map_err(|e| e.to_string()));
        }
    }
}
