//! Property values
//!
//! Values are typed by the schema; the JSON form alone is ambiguous (a node
//! reference and a plain string look the same), so decoding always goes
//! through the property descriptor.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::json;

use crate::annotated_text::{AnnotatedText, Annotation};
use crate::node::NodeId;
use crate::schema::{PrimitiveType, PropertyType};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    StringArray(Vec<String>),
    NumberArray(Vec<f64>),
    BooleanArray(Vec<bool>),
    IntegerArray(Vec<i64>),
    /// Single node reference
    Node(Option<NodeId>),
    NodeArray(Vec<NodeId>),
    AnnotatedText(AnnotatedText),
}

impl Value {
    /// Empty value used when instantiating a node of a type
    pub fn default_for(ty: &PropertyType) -> Value {
        match ty {
            PropertyType::Primitive(PrimitiveType::StringArray) => Value::StringArray(Vec::new()),
            PropertyType::Primitive(PrimitiveType::NumberArray) => Value::NumberArray(Vec::new()),
            PropertyType::Primitive(PrimitiveType::BooleanArray) => {
                Value::BooleanArray(Vec::new())
            }
            PropertyType::Primitive(PrimitiveType::IntegerArray) => {
                Value::IntegerArray(Vec::new())
            }
            PropertyType::Primitive(_) => Value::Null,
            PropertyType::Node(_) => Value::Node(None),
            PropertyType::NodeArray(_) => Value::NodeArray(Vec::new()),
            PropertyType::AnnotatedText(_) => Value::AnnotatedText(AnnotatedText::default()),
        }
    }

    pub fn conforms_to(&self, ty: &PropertyType) -> bool {
        match (ty, self) {
            (PropertyType::Primitive(p), value) => match (p, value) {
                (_, Value::Null) => !p.is_array(),
                (PrimitiveType::String, Value::String(_))
                | (PrimitiveType::Number, Value::Number(_))
                | (PrimitiveType::Number, Value::Integer(_))
                | (PrimitiveType::Boolean, Value::Boolean(_))
                | (PrimitiveType::Integer, Value::Integer(_))
                | (PrimitiveType::Datetime, Value::DateTime(_))
                | (PrimitiveType::StringArray, Value::StringArray(_))
                | (PrimitiveType::NumberArray, Value::NumberArray(_))
                | (PrimitiveType::BooleanArray, Value::BooleanArray(_))
                | (PrimitiveType::IntegerArray, Value::IntegerArray(_)) => true,
                _ => false,
            },
            (PropertyType::Node(_), Value::Node(_)) => true,
            (PropertyType::NodeArray(_), Value::NodeArray(_)) => true,
            (PropertyType::AnnotatedText(_), Value::AnnotatedText(_)) => true,
            _ => false,
        }
    }

    /// Node ids this value points at
    pub fn references(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Value::Node(Some(id)) => Box::new(std::iter::once(id.as_str())),
            Value::NodeArray(ids) => Box::new(ids.iter().map(String::as_str)),
            Value::AnnotatedText(text) => {
                Box::new(text.annotations.iter().map(|a| a.node_id.as_str()))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Element `index` of a primitive array, as a scalar value
    pub fn element(&self, index: usize) -> Option<Value> {
        match self {
            Value::StringArray(items) => items.get(index).cloned().map(Value::String),
            Value::NumberArray(items) => items.get(index).copied().map(Value::Number),
            Value::BooleanArray(items) => items.get(index).copied().map(Value::Boolean),
            Value::IntegerArray(items) => items.get(index).copied().map(Value::Integer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node_array(&self) -> Option<&[NodeId]> {
        match self {
            Value::NodeArray(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn as_annotated_text(&self) -> Option<&AnnotatedText> {
        match self {
            Value::AnnotatedText(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Node(None) => serde_json::Value::Null,
            Value::String(s) => json!(s),
            Value::Number(n) => json!(n),
            Value::Integer(i) => json!(i),
            Value::Boolean(b) => json!(b),
            Value::DateTime(dt) => json!(dt.to_rfc3339()),
            Value::StringArray(items) => json!(items),
            Value::NumberArray(items) => json!(items),
            Value::BooleanArray(items) => json!(items),
            Value::IntegerArray(items) => json!(items),
            Value::Node(Some(id)) => json!(id),
            Value::NodeArray(ids) => json!(ids),
            Value::AnnotatedText(text) => json!({
                "text": text.text,
                "annotations": text.annotations,
            }),
        }
    }

    /// Decode a JSON value for a property of type `ty`
    pub fn from_json(ty: &PropertyType, json: &serde_json::Value) -> Option<Value> {
        use serde_json::Value as Json;

        if json.is_null() {
            return Some(Value::default_for(ty));
        }

        match ty {
            PropertyType::Primitive(p) => match p {
                PrimitiveType::String => json.as_str().map(|s| Value::String(s.to_string())),
                PrimitiveType::Number => json.as_f64().map(Value::Number),
                PrimitiveType::Boolean => json.as_bool().map(Value::Boolean),
                PrimitiveType::Integer => json.as_i64().map(Value::Integer),
                PrimitiveType::Datetime => json
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
                PrimitiveType::StringArray => {
                    collect(json, |v| v.as_str().map(str::to_string)).map(Value::StringArray)
                }
                PrimitiveType::NumberArray => collect(json, Json::as_f64).map(Value::NumberArray),
                PrimitiveType::BooleanArray => {
                    collect(json, Json::as_bool).map(Value::BooleanArray)
                }
                PrimitiveType::IntegerArray => {
                    collect(json, Json::as_i64).map(Value::IntegerArray)
                }
            },
            PropertyType::Node(_) => json.as_str().map(|s| Value::Node(Some(s.to_string()))),
            PropertyType::NodeArray(_) => {
                collect(json, |v| v.as_str().map(str::to_string)).map(Value::NodeArray)
            }
            PropertyType::AnnotatedText(_) => {
                let text = json.get("text")?.as_str()?;
                let annotations: Vec<Annotation> = match json.get("annotations") {
                    None | Some(Json::Null) => Vec::new(),
                    Some(raw) => serde_json::from_value(raw.clone()).ok()?,
                };
                Some(Value::AnnotatedText(AnnotatedText::with_annotations(
                    text,
                    annotations,
                )))
            }
        }
    }
}

fn collect<T>(
    json: &serde_json::Value,
    item: impl Fn(&serde_json::Value) -> Option<T>,
) -> Option<Vec<T>> {
    json.as_array()?.iter().map(item).collect()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<AnnotatedText> for Value {
    fn from(text: AnnotatedText) -> Self {
        Value::AnnotatedText(text)
    }
}
