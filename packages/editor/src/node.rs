//! Node records

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::errors::{Result, ValidationError};
use crate::schema::Schema;
use crate::value::Value;

pub type NodeId = String;

/// A node id is non-empty, has no whitespace or `.` and is not purely
/// numeric, so it can never be confused with an index in a dotted path.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.chars().any(|c| c.is_whitespace() || c == '.')
        && !id.chars().all(|c| c.is_ascii_digit())
}

/// Typed, identified record in the document graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub node_type: String,
    /// One value per property declared by the node type, in schema order
    pub properties: IndexMap<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties: IndexMap::new(),
        }
    }

    /// Builder-style property assignment
    pub fn with(mut self, property: impl Into<String>, value: Value) -> Self {
        self.properties.insert(property.into(), value);
        self
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Ids of all nodes this node points at, in property order.
    /// Includes annotation nodes referenced from annotated text.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.properties.values().flat_map(Value::references)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert("id".into(), self.id.clone().into());
        object.insert("type".into(), self.node_type.clone().into());
        for (name, value) in &self.properties {
            object.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }

    /// Read a node from its plain JSON form, using the schema to type each
    /// property value.
    pub fn from_json(schema: &Schema, json: &serde_json::Value) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| ValidationError::Malformed("node is not an object".into()))?;
        let id = object
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::Malformed("node has no string id".into()))?;
        let node_type = object
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::Malformed(format!("node {id} has no type")))?;

        let descriptor = schema.node_type(node_type)?;
        let mut node = Node::new(id, node_type);
        for (name, ty) in &descriptor.properties {
            let value = match object.get(name) {
                None | Some(serde_json::Value::Null) => Value::default_for(ty),
                Some(raw) => Value::from_json(ty, raw).ok_or_else(|| {
                    ValidationError::WrongValueKind {
                        node_id: id.to_string(),
                        property: name.clone(),
                    }
                })?,
            };
            node.properties.insert(name.clone(), value);
        }

        Ok(node)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len() + 2))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", &self.node_type)?;
        for (name, value) in &self.properties {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
