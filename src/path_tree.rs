//! [PathTree]: the structural mirror of a query marking which fields resolve locally.
//!
//! The tree only holds forward edges. It is built by [crate::split::split], filled in by a
//! [crate::resolver::ResolverRuntime] and consumed by [crate::merge::merge].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{btree_map, BTreeMap};

/// Local resolution state of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocalResolution {
    /// Marked for local resolution, no value yet
    Pending,
    Resolved(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    /// Field name as written in the query. May differ from the node's key when aliased.
    pub field_name: String,
    pub resolve_locally: Option<LocalResolution>,
    pub children: PathTree,
}

impl PathNode {
    pub fn new(field_name: &str) -> Self {
        PathNode {
            field_name: field_name.to_string(),
            ..Default::default()
        }
    }

    pub fn pending(field_name: &str) -> Self {
        PathNode {
            field_name: field_name.to_string(),
            resolve_locally: Some(LocalResolution::Pending),
            children: PathTree::default(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.resolve_locally.is_some()
    }

    pub fn resolved_value(&self) -> Option<&Value> {
        match &self.resolve_locally {
            Some(LocalResolution::Resolved(value)) => Some(value),
            _ => None,
        }
    }

    /// A node with no marker and no children carries nothing for the merge step.
    pub fn is_dead(&self) -> bool {
        self.resolve_locally.is_none() && self.children.is_empty()
    }

    /// Combine another node for the same response key into this one. A local marker wins over
    /// nested children.
    fn absorb(&mut self, other: PathNode) {
        if self.is_local() {
            return;
        }
        if other.is_local() {
            *self = other;
            return;
        }
        for (key, node) in other.children.0 {
            self.children.insert(key, node);
        }
    }
}

/// Response key -> [PathNode]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathTree(BTreeMap<String, PathNode>);

impl PathTree {
    pub fn new() -> Self {
        PathTree::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&PathNode> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PathNode> {
        self.0.get_mut(key)
    }

    /// Insert a node, merging it with an existing node under the same key. Dead nodes are
    /// dropped.
    pub fn insert(&mut self, key: String, node: PathNode) {
        if node.is_dead() {
            return;
        }
        match self.0.entry(key) {
            btree_map::Entry::Occupied(mut existing) => existing.get_mut().absorb(node),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(node);
            }
        }
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, PathNode> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, PathNode> {
        self.0.iter_mut()
    }

    /// Look up a node by its response-key path.
    pub fn node_at<S: AsRef<str>>(&self, path: &[S]) -> Option<&PathNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.0.get(first.as_ref())?;
        for key in rest {
            node = node.children.get(key.as_ref())?;
        }
        Some(node)
    }

    /// True while any node in the tree is still [LocalResolution::Pending].
    pub fn has_pending(&self) -> bool {
        self.0.values().any(|node| match &node.resolve_locally {
            Some(LocalResolution::Pending) => true,
            Some(LocalResolution::Resolved(_)) => false,
            None => node.children.has_pending(),
        })
    }

    /// Response-key paths of every locally resolved node, depth first in key order.
    pub fn local_paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        let mut prefix = Vec::new();
        self.collect_local_paths(&mut prefix, &mut paths);
        paths
    }

    fn collect_local_paths(&self, prefix: &mut Vec<String>, paths: &mut Vec<Vec<String>>) {
        for (key, node) in self.0.iter() {
            prefix.push(key.clone());
            if node.is_local() {
                paths.push(prefix.clone());
            } else {
                node.children.collect_local_paths(prefix, paths);
            }
            prefix.pop();
        }
    }
}

impl<'a> IntoIterator for &'a PathTree {
    type Item = (&'a String, &'a PathNode);
    type IntoIter = btree_map::Iter<'a, String, PathNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
