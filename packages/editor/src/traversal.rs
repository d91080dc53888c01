//! # Traversal
//!
//! Depth-first walk from the document root. Children are emitted before the
//! node that references them, so the result reads leaves first, root last.
//! Nodes that cannot be reached from the root never appear, which makes the
//! walk the final garbage collector for anything reference counting missed.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::document::Document;
use crate::node::Node;

/// Reachable nodes, leaves first, root last, each exactly once
pub fn traverse(doc: &Document) -> Vec<Arc<Node>> {
    let mut visited = HashSet::new();
    let mut ordered = Vec::with_capacity(doc.len());
    visit(doc, doc.document_id(), &mut visited, &mut ordered);
    ordered
}

fn visit<'a>(
    doc: &'a Document,
    id: &'a str,
    visited: &mut HashSet<&'a str>,
    ordered: &mut Vec<Arc<Node>>,
) {
    if !visited.insert(id) {
        return;
    }
    let Some(node) = doc.node(id) else {
        return;
    };

    for child in node.references() {
        visit(doc, child, visited, ordered);
    }
    ordered.push(Arc::clone(node));
}

/// `{ document_id, nodes: [...] }` with nodes in traversal order
pub fn to_json(doc: &Document) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = traverse(doc).iter().map(|n| n.to_json()).collect();
    json!({
        "document_id": doc.document_id(),
        "nodes": nodes,
    })
}

/// `{ document_id, nodes: { id: node } }`
pub fn to_json_map(doc: &Document) -> serde_json::Value {
    let nodes: serde_json::Map<String, serde_json::Value> = traverse(doc)
        .iter()
        .map(|n| (n.id.clone(), n.to_json()))
        .collect();
    json!({
        "document_id": doc.document_id(),
        "nodes": nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_document, sample_schema};
    use crate::value::Value;

    #[test]
    fn test_leaves_first_root_last() {
        let doc = sample_document();
        let ids: Vec<String> = traverse(&doc).iter().map(|n| n.id.clone()).collect();

        assert_eq!(
            ids,
            vec![
                "cover_1",
                "strong_1",
                "story_1",
                "list_item_1",
                "list_item_2",
                "list_1",
                "page_1"
            ]
        );
    }

    #[test]
    fn test_unreachable_nodes_are_pruned() {
        let schema = Arc::new(sample_schema());
        let page = schema
            .instantiate("page_1", "page")
            .unwrap()
            .with("body", Value::NodeArray(vec!["story_1".into(), "ghost".into()]));
        let story = schema.instantiate("story_1", "story").unwrap();
        let orphan = schema.instantiate("orphan", "story").unwrap();

        let doc = Document::new(schema, "page_1", vec![page, story, orphan]).unwrap();
        let json = to_json(&doc);
        let ids: Vec<&str> = json["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["id"].as_str().unwrap())
            .collect();

        assert_eq!(ids, vec!["story_1", "page_1"]);
    }
}
