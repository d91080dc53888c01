//! # Reference Counting
//!
//! A node stays alive while something points at it: a `node` or `node_array`
//! property, or an annotation inside annotated text. Removing ids from a
//! node array can leave whole subgraphs unreferenced; [`collect_orphans`]
//! finds them so the transaction can delete them one by one (and record an
//! inverse for each).

use std::collections::HashSet;

use tracing::debug;

use crate::document::Document;
use crate::node::NodeId;

/// Number of places in the document that reference `id`
pub fn count_references(doc: &Document, id: &str) -> usize {
    count_references_excluding(doc, id, &HashSet::new())
}

/// Like [`count_references`], ignoring references held by `excluded` nodes
pub fn count_references_excluding(doc: &Document, id: &str, excluded: &HashSet<NodeId>) -> usize {
    doc.nodes()
        .filter(|node| !excluded.contains(&node.id))
        .map(|node| node.references().filter(|r| *r == id).count())
        .sum()
}

/// Nodes left unreferenced once `seeds` lost a reference.
///
/// Every seed and everything reachable from it is a candidate. A candidate
/// survives if a node outside the candidate set still references it; that
/// survivor then keeps its own children alive, so the check repeats until
/// nothing changes. What remains has a reference count of zero once dead
/// nodes are excluded, including cycles that only reference each other.
/// The root is never collected. Ids are returned in discovery order.
pub fn collect_orphans(doc: &Document, seeds: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
    let mut stack: Vec<NodeId> = seeds.into_iter().collect();
    stack.reverse();

    let mut candidates: Vec<NodeId> = Vec::new();
    let mut marked: HashSet<NodeId> = HashSet::new();
    while let Some(id) = stack.pop() {
        if id == doc.document_id() || marked.contains(&id) {
            continue;
        }
        let Some(node) = doc.node(&id) else {
            continue;
        };
        let mut children: Vec<NodeId> = node.references().map(str::to_string).collect();
        children.reverse();
        marked.insert(id.clone());
        candidates.push(id);
        stack.extend(children);
    }

    loop {
        let live: HashSet<&str> = doc
            .nodes()
            .filter(|node| !marked.contains(&node.id))
            .flat_map(|node| node.references())
            .collect();

        let rescued: Vec<NodeId> = candidates
            .iter()
            .filter(|id| marked.contains(*id) && live.contains(id.as_str()))
            .cloned()
            .collect();
        if rescued.is_empty() {
            break;
        }
        for id in rescued {
            debug!(node_id = %id, "Node still referenced, keeping");
            marked.remove(&id);
        }
    }

    candidates.retain(|id| marked.contains(id));
    candidates
}
