//! Local resolution of fields marked with the local directive.
//!
//! A [ResolverRuntime] receives the [PathTree] produced by [crate::split::split] and returns it
//! with every `Pending` marker replaced by a value. [ResolverTable] is the bundled runtime: a
//! nested table of resolver functions keyed by field name, mirroring the query's nesting.

use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::Arc,
};

use crate::{
    error::ClientError,
    path_tree::{LocalResolution, PathTree},
    query::Variables,
};

pub trait ResolverRuntime: Sync {
    /// Resolve every pending node of `path_tree`. `server_data` is the server's result for the
    /// same query, absent when the query was not sent.
    fn resolve_local_fields(
        &self,
        path_tree: PathTree,
        server_data: Option<&Value>,
        variables: &Variables,
    ) -> impl Future<Output = Result<PathTree, ClientError>> + Send;
}

/// What a resolver function gets to see.
#[derive(Debug, Clone, Copy)]
pub struct ResolverArgs<'a> {
    /// Response keys from the root to the resolved field
    pub path: &'a [String],
    pub field_name: &'a str,
    /// Server value holding the resolved field, if any
    pub parent: Option<&'a Value>,
    pub variables: &'a Variables,
}

pub type ResolverFn = Arc<dyn Fn(&ResolverArgs<'_>) -> Result<Value, ClientError> + Send + Sync>;

#[derive(Clone)]
pub enum ResolverEntry {
    Leaf(ResolverFn),
    Table(ResolverTable),
}

impl Debug for ResolverEntry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ResolverEntry::Leaf(_) => f.write_str("Leaf(<fn>)"),
            ResolverEntry::Table(table) => f.debug_tuple("Table").field(table).finish(),
        }
    }
}

/// Field name -> [ResolverEntry]
#[derive(Debug, Clone, Default)]
pub struct ResolverTable(BTreeMap<String, ResolverEntry>);

impl ResolverTable {
    pub fn new() -> Self {
        ResolverTable::default()
    }

    /// Register a resolver function for `field_name` at this level.
    pub fn leaf<F>(mut self, field_name: &str, resolver: F) -> Self
    where
        F: Fn(&ResolverArgs<'_>) -> Result<Value, ClientError> + Send + Sync + 'static,
    {
        self.0
            .insert(field_name.to_string(), ResolverEntry::Leaf(Arc::new(resolver)));
        self
    }

    /// Register the resolvers for the children of `field_name`.
    pub fn table(mut self, field_name: &str, table: ResolverTable) -> Self {
        self.0
            .insert(field_name.to_string(), ResolverEntry::Table(table));
        self
    }

    pub fn get(&self, field_name: &str) -> Option<&ResolverEntry> {
        self.0.get(field_name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve synchronously. [ResolverRuntime::resolve_local_fields] wraps this.
    pub fn resolve(
        &self,
        mut path_tree: PathTree,
        server_data: Option<&Value>,
        variables: &Variables,
    ) -> Result<PathTree, ClientError> {
        let mut path = Vec::new();
        self.resolve_tree(&mut path_tree, server_data, variables, &mut path)?;
        Ok(path_tree)
    }

    fn resolve_tree(
        &self,
        tree: &mut PathTree,
        parent: Option<&Value>,
        variables: &Variables,
        path: &mut Vec<String>,
    ) -> Result<(), ClientError> {
        for (key, node) in tree.iter_mut() {
            path.push(key.clone());
            let entry = self.0.get(&node.field_name);
            match (&node.resolve_locally, entry) {
                (Some(LocalResolution::Resolved(_)), _) => {}
                (Some(LocalResolution::Pending), Some(ResolverEntry::Leaf(resolver))) => {
                    let args = ResolverArgs {
                        path: path.as_slice(),
                        field_name: &node.field_name,
                        parent,
                        variables,
                    };
                    let value = resolver(&args)?;
                    node.resolve_locally = Some(LocalResolution::Resolved(value));
                }
                (None, Some(ResolverEntry::Table(table))) => {
                    let child = parent.and_then(|value| value.get(key.as_str()));
                    table.resolve_tree(&mut node.children, child, variables, path)?;
                }
                _ => {
                    return Err(ClientError::Resolver(format!(
                        "No resolver registered for '{}'",
                        path.join(".")
                    )));
                }
            }
            path.pop();
        }
        Ok(())
    }
}

impl ResolverRuntime for ResolverTable {
    fn resolve_local_fields(
        &self,
        path_tree: PathTree,
        server_data: Option<&Value>,
        variables: &Variables,
    ) -> impl Future<Output = Result<PathTree, ClientError>> + Send {
        std::future::ready(self.resolve(path_tree, server_data, variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path_tree::PathNode, query::parse, split::split};
    use serde_json::json;
    use test_log::test;

    fn path_tree(query: &str) -> PathTree {
        split(&parse(query).unwrap(), "local").path_tree
    }

    #[test(tokio::test)]
    async fn test_nested_resolvers_follow_the_query() {
        let table = ResolverTable::new()
            .leaf("darkMode", |_| Ok(json!(true)))
            .table(
                "user",
                ResolverTable::new().leaf("age", |args| {
                    let name = args
                        .parent
                        .and_then(|user| user.get("name"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    Ok(json!(name.len()))
                }),
            );
        let server = json!({ "user": { "name": "Alice" } });
        let resolved = table
            .resolve_local_fields(
                path_tree("{ user { name age @local } darkMode @local }"),
                Some(&server),
                &Variables::new(),
            )
            .await
            .unwrap();
        assert!(!resolved.has_pending());
        assert_eq!(
            resolved
                .node_at(&["user", "age"])
                .and_then(PathNode::resolved_value),
            Some(&json!(5))
        );
        assert_eq!(
            resolved.node_at(&["darkMode"]).and_then(PathNode::resolved_value),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_aliases_resolve_by_field_name() {
        let table = ResolverTable::new().leaf("flag", |args| Ok(json!(args.path.join("."))));
        let resolved = table
            .resolve(
                path_tree("{ a: flag @local b: flag @local }"),
                None,
                &Variables::new(),
            )
            .unwrap();
        assert_eq!(
            resolved.node_at(&["a"]).and_then(PathNode::resolved_value),
            Some(&json!("a"))
        );
        assert_eq!(
            resolved.node_at(&["b"]).and_then(PathNode::resolved_value),
            Some(&json!("b"))
        );
    }

    #[test]
    fn test_variables_reach_resolvers() {
        let table = ResolverTable::new().leaf("echo", |args| {
            Ok(args.variables.get("msg").cloned().unwrap_or(Value::Null))
        });
        let mut variables = Variables::new();
        variables.insert("msg".to_string(), json!("hi"));
        let resolved = table
            .resolve(path_tree("{ echo @local }"), None, &variables)
            .unwrap();
        assert_eq!(
            resolved.node_at(&["echo"]).and_then(PathNode::resolved_value),
            Some(&json!("hi"))
        );
    }

    #[test]
    fn test_missing_resolver_is_an_error() {
        let table = ResolverTable::new().table("user", ResolverTable::new());
        let result = table.resolve(
            path_tree("{ user { age @local } }"),
            None,
            &Variables::new(),
        );
        assert!(matches!(result, Err(ClientError::Resolver(msg)) if msg.contains("user.age")));
    }

    #[test]
    fn test_resolver_errors_propagate() {
        let table = ResolverTable::new()
            .leaf("broken", |_| Err(ClientError::Resolver("boom".to_string())));
        let result = table.resolve(path_tree("{ broken @local }"), None, &Variables::new());
        assert_eq!(result, Err(ClientError::Resolver("boom".to_string())));
    }
}
