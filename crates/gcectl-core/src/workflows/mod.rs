//! Concrete workflows built on [`crate::workflow`]
//!
//! Each module exposes a params struct and a constructor returning a
//! ready-to-run [`crate::workflow::Workflow`]. All names are derived from
//! the params; nothing project-specific is baked in.

pub mod create_instance;
pub mod resize;
pub mod roll_image;

pub use create_instance::{CreateInstanceParams, create_instance_workflow};
pub use resize::{ResizeParams, pending_actions, resize_workflow};
pub use roll_image::{RollImageParams, roll_image_workflow};

use serde_json::Value;

/// Fields the API sets on read that must not be sent back on insert
const OUTPUT_ONLY_FIELDS: [&str; 4] = ["id", "selfLink", "creationTimestamp", "kind"];

/// Remove server-populated fields from a document before re-inserting it
pub(crate) fn strip_output_only(doc: &mut Value) {
    if let Some(obj) = doc.as_object_mut() {
        for field in OUTPUT_ONLY_FIELDS {
            obj.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_output_only() {
        let mut doc = json!({
            "id": "123",
            "kind": "compute#instanceTemplate",
            "selfLink": "https://x",
            "creationTimestamp": "2024-01-01",
            "name": "tpl",
            "properties": {"machineType": "n1"}
        });
        strip_output_only(&mut doc);
        assert_eq!(doc, json!({"name": "tpl", "properties": {"machineType": "n1"}}));
    }
}
