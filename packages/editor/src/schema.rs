//! # Schema Registry
//!
//! Static description of node types and their properties. A schema is a plain
//! data value: it can be built in code or deserialized from JSON such as
//!
//! ```json
//! {
//!   "page":  { "kind": "document", "properties": {
//!       "body": { "type": "node_array", "node_types": ["story", "list"] } } },
//!   "story": { "kind": "text", "properties": {
//!       "content": { "type": "annotated_text", "node_types": ["strong"] } } },
//!   "strong": { "kind": "annotation" }
//! }
//! ```
//!
//! Cross references between types are checked once, in [`Schema::new`].

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SchemaError, ValidationError};
use crate::node::{is_valid_id, Node};
use crate::value::Value;

/// Role of a node type in the document graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Block,
    Text,
    Annotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    String,
    Number,
    Boolean,
    Integer,
    Datetime,
    StringArray,
    NumberArray,
    BooleanArray,
    IntegerArray,
}

impl PrimitiveType {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            PrimitiveType::StringArray
                | PrimitiveType::NumberArray
                | PrimitiveType::BooleanArray
                | PrimitiveType::IntegerArray
        )
    }
}

/// Allowed targets of a `node` or `node_array` property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub node_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_node_type: Option<String>,
}

impl ReferenceSpec {
    pub fn new<I, S>(node_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node_types: node_types.into_iter().map(Into::into).collect(),
            default_node_type: None,
        }
    }

    pub fn with_default(mut self, node_type: impl Into<String>) -> Self {
        self.default_node_type = Some(node_type.into());
        self
    }

    pub fn allows(&self, node_type: &str) -> bool {
        self.node_types.iter().any(|t| t == node_type)
    }
}

/// Allowed annotation types of an `annotated_text` property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpec {
    #[serde(default)]
    pub node_types: Vec<String>,
    #[serde(default)]
    pub allow_newlines: bool,
}

impl TextSpec {
    pub fn new<I, S>(node_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node_types: node_types.into_iter().map(Into::into).collect(),
            allow_newlines: false,
        }
    }

    pub fn allow_newlines(mut self) -> Self {
        self.allow_newlines = true;
        self
    }

    pub fn allows(&self, node_type: &str) -> bool {
        self.node_types.iter().any(|t| t == node_type)
    }
}

/// Property descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PropertyTypeRepr", into = "PropertyTypeRepr")]
pub enum PropertyType {
    Primitive(PrimitiveType),
    Node(ReferenceSpec),
    NodeArray(ReferenceSpec),
    AnnotatedText(TextSpec),
}

impl PropertyType {
    pub fn references(&self) -> Option<&ReferenceSpec> {
        match self {
            PropertyType::Node(spec) | PropertyType::NodeArray(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn is_node_array(&self) -> bool {
        matches!(self, PropertyType::NodeArray(_))
    }
}

// Primitives are bare strings ("string"); composite kinds are tagged objects.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PropertyTypeRepr {
    Primitive(PrimitiveType),
    Composite(CompositeRepr),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CompositeRepr {
    Node(ReferenceSpec),
    NodeArray(ReferenceSpec),
    AnnotatedText(TextSpec),
}

impl From<PropertyTypeRepr> for PropertyType {
    fn from(repr: PropertyTypeRepr) -> Self {
        match repr {
            PropertyTypeRepr::Primitive(p) => PropertyType::Primitive(p),
            PropertyTypeRepr::Composite(CompositeRepr::Node(spec)) => PropertyType::Node(spec),
            PropertyTypeRepr::Composite(CompositeRepr::NodeArray(spec)) => {
                PropertyType::NodeArray(spec)
            }
            PropertyTypeRepr::Composite(CompositeRepr::AnnotatedText(spec)) => {
                PropertyType::AnnotatedText(spec)
            }
        }
    }
}

impl From<PropertyType> for PropertyTypeRepr {
    fn from(ty: PropertyType) -> Self {
        match ty {
            PropertyType::Primitive(p) => PropertyTypeRepr::Primitive(p),
            PropertyType::Node(spec) => PropertyTypeRepr::Composite(CompositeRepr::Node(spec)),
            PropertyType::NodeArray(spec) => {
                PropertyTypeRepr::Composite(CompositeRepr::NodeArray(spec))
            }
            PropertyType::AnnotatedText(spec) => {
                PropertyTypeRepr::Composite(CompositeRepr::AnnotatedText(spec))
            }
        }
    }
}

/// Node type descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    pub kind: NodeKind,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyType>,
}

impl NodeType {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            properties: IndexMap::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }
}

const IMPLICIT_PROPERTY: PropertyType = PropertyType::Primitive(PrimitiveType::String);

/// Validated mapping from type name to descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "IndexMap<String, NodeType>",
    into = "IndexMap<String, NodeType>"
)]
pub struct Schema {
    types: IndexMap<String, NodeType>,
}

impl Schema {
    /// Build a schema, checking that every referenced type exists
    pub fn new(types: IndexMap<String, NodeType>) -> std::result::Result<Self, SchemaError> {
        for (type_name, descriptor) in &types {
            for (property, ty) in &descriptor.properties {
                let mut targets: Vec<&String> = Vec::new();
                match ty {
                    PropertyType::Primitive(_) => {}
                    PropertyType::Node(spec) | PropertyType::NodeArray(spec) => {
                        targets.extend(&spec.node_types);
                        targets.extend(&spec.default_node_type);
                    }
                    PropertyType::AnnotatedText(spec) => {
                        for target in &spec.node_types {
                            match types.get(target) {
                                Some(t) if t.kind != NodeKind::Annotation => {
                                    return Err(SchemaError::NotAnAnnotationType {
                                        node_type: type_name.clone(),
                                        property: property.clone(),
                                        target: target.clone(),
                                    });
                                }
                                _ => targets.push(target),
                            }
                        }
                    }
                }

                if let Some(missing) = targets.into_iter().find(|t| !types.contains_key(*t)) {
                    return Err(SchemaError::UnknownReference {
                        node_type: type_name.clone(),
                        property: property.clone(),
                        target: missing.clone(),
                    });
                }
            }
        }

        Ok(Self { types })
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(json)?)
    }

    pub fn node_type(&self, name: &str) -> std::result::Result<&NodeType, SchemaError> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Descriptor of `node_type.property`, including the implicit `id`/`type`
    pub fn property_type(
        &self,
        node_type: &str,
        property: &str,
    ) -> std::result::Result<Cow<'_, PropertyType>, SchemaError> {
        let descriptor = self.node_type(node_type)?;
        if property == "id" || property == "type" {
            return Ok(Cow::Owned(IMPLICIT_PROPERTY));
        }
        descriptor
            .properties
            .get(property)
            .map(Cow::Borrowed)
            .ok_or_else(|| SchemaError::UnknownProperty {
                node_type: node_type.to_string(),
                property: property.to_string(),
            })
    }

    /// A node of `node_type` with every property at its empty value
    pub fn instantiate(&self, id: impl Into<String>, node_type: &str) -> Result<Node> {
        let descriptor = self.node_type(node_type)?;
        let mut node = Node::new(id, node_type);
        for (name, ty) in &descriptor.properties {
            node.properties.insert(name.clone(), Value::default_for(ty));
        }
        Ok(node)
    }

    /// Check a node's own shape. References are checked by the document.
    pub fn validate_node(&self, node: &Node) -> Result<()> {
        if !is_valid_id(&node.id) {
            return Err(ValidationError::InvalidId(node.id.clone()).into());
        }
        let descriptor = self.node_type(&node.node_type)?;

        if let Some(extra) = node
            .properties
            .keys()
            .find(|name| !descriptor.properties.contains_key(*name))
        {
            return Err(SchemaError::UnknownProperty {
                node_type: node.node_type.clone(),
                property: extra.clone(),
            }
            .into());
        }

        for (name, ty) in &descriptor.properties {
            let value = node
                .properties
                .get(name)
                .ok_or_else(|| ValidationError::MissingProperty {
                    node_id: node.id.clone(),
                    property: name.clone(),
                })?;

            if !value.conforms_to(ty) {
                return Err(ValidationError::WrongValueKind {
                    node_id: node.id.clone(),
                    property: name.clone(),
                }
                .into());
            }

            if let Value::AnnotatedText(text) = value {
                let len = text.len();
                if let Some(bad) = text
                    .annotations
                    .iter()
                    .find(|a| a.start_offset >= a.end_offset || a.end_offset > len)
                {
                    return Err(ValidationError::InvalidAnnotation {
                        node_id: node.id.clone(),
                        property: name.clone(),
                        start: bad.start_offset,
                        end: bad.end_offset,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<IndexMap<String, NodeType>> for Schema {
    type Error = SchemaError;

    fn try_from(types: IndexMap<String, NodeType>) -> std::result::Result<Self, Self::Error> {
        Schema::new(types)
    }
}

impl From<Schema> for IndexMap<String, NodeType> {
    fn from(schema: Schema) -> Self {
        schema.types
    }
}
