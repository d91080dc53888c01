//! # Primitive Operations
//!
//! Every change to a document is one of three primitives. Each has an exact
//! inverse, recorded by the transaction when the forward op is applied:
//!
//! | Forward                 | Inverse                        |
//! |-------------------------|--------------------------------|
//! | `Set { path, value }`   | `Set { path, previous value }` |
//! | `Create { node }`       | `Delete { node.id }`           |
//! | `Delete { node_id }`    | `Create { copy of the node }`  |

use serde::Serialize;

use crate::node::{Node, NodeId};
use crate::path::Path;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Replace a property value. `path` is always `[node id, property]`.
    Set { path: Path, value: Value },
    Create { node: Node },
    Delete { node_id: NodeId },
}
