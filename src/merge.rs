//! Splicing locally resolved values back into a server result.

use serde_json::{Map, Value};

use crate::path_tree::{LocalResolution, PathTree};

/// Merge every resolved value in `path_tree` into `server` in place.
///
/// Lists are transparent: the node applied to a list is applied to each element. A `null` the
/// server returned for an intermediate field is left alone.
pub fn merge(server: &mut Value, path_tree: &PathTree) {
    match server {
        Value::Array(items) => {
            for item in items.iter_mut() {
                merge(item, path_tree);
            }
        }
        Value::Object(object) => merge_object(object, path_tree),
        Value::Null => {}
        other => {
            tracing::warn!(
                "[merge] can not merge local fields into scalar value {}",
                other
            );
        }
    }
}

fn merge_object(object: &mut Map<String, Value>, path_tree: &PathTree) {
    for (key, node) in path_tree.iter() {
        match &node.resolve_locally {
            Some(LocalResolution::Resolved(value)) => {
                object.insert(key.clone(), value.clone());
            }
            Some(LocalResolution::Pending) => {
                tracing::warn!("[merge] local field '{}' was never resolved", key);
            }
            None => {
                let child = object
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                merge(child, &node.children);
            }
        }
    }
}
