//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use quire_editor::{EditorConfig, Schema, Session};
use serde_json::json;

static TRACING: Once = Once::new();

/// Route editor logs to the test output (`RUST_LOG` is not consulted)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub fn schema() -> Arc<Schema> {
    let schema = Schema::from_json(json!({
        "page": {
            "kind": "document",
            "properties": {
                "title": "string",
                "body": { "type": "node_array", "node_types": ["story", "list"] }
            }
        },
        "story": {
            "kind": "text",
            "properties": {
                "content": { "type": "annotated_text", "node_types": ["strong", "link"] }
            }
        },
        "list": {
            "kind": "block",
            "properties": {
                "items": { "type": "node_array", "node_types": ["list_item"] }
            }
        },
        "list_item": {
            "kind": "text",
            "properties": {
                "content": {
                    "type": "annotated_text",
                    "node_types": ["strong", "link"],
                    "allow_newlines": true
                }
            }
        },
        "strong": { "kind": "annotation" },
        "link": { "kind": "annotation", "properties": { "href": "string" } }
    }))
    .expect("fixture schema is valid");
    Arc::new(schema)
}

/// `page_1.body = [story_1, story_1, list_1]`
pub fn document_json() -> serde_json::Value {
    json!({
        "document_id": "page_1",
        "nodes": {
            "page_1": {
                "id": "page_1",
                "type": "page",
                "title": "Welcome",
                "body": ["story_1", "story_1", "list_1"]
            },
            "story_1": {
                "id": "story_1",
                "type": "story",
                "content": {
                    "text": "Hello world",
                    "annotations": [
                        { "start_offset": 6, "end_offset": 11, "node_id": "strong_1" }
                    ]
                }
            },
            "strong_1": { "id": "strong_1", "type": "strong" },
            "list_1": {
                "id": "list_1",
                "type": "list",
                "items": ["list_item_1", "list_item_2"]
            },
            "list_item_1": { "id": "list_item_1", "type": "list_item", "content": { "text": "One" } },
            "list_item_2": { "id": "list_item_2", "type": "list_item", "content": { "text": "Two" } }
        }
    })
}

pub fn session() -> Session {
    init_tracing();
    Session::from_json(schema(), &document_json(), EditorConfig::default())
        .expect("fixture document is valid")
}
