//! Query module: owned syntax tree for GraphQL-style queries plus the pure rewriting
//! primitives the rest of the crate is built on.
//!
//! # Module Organization
//!
//! - [`parse`](fn@parse): text (or an existing tree) to [`Document`], through `async-graphql-parser`
//! - [`print`](fn@print): deterministic canonical text, used as the cache key
//! - [`add_fields`], [`remove_fields`], [`inline_fragments`]: tree rewrites returning new trees
//!
//! The tree is intentionally small. Argument and default values are kept in their printed
//! literal form since nothing in the cache needs to evaluate them.

mod convert;
mod modify;
mod print;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{self, Display, Formatter, Write},
    str::FromStr,
};

use crate::error::ClientError;

pub use modify::{add_fields, inline_fragments, remove_fields};

/// Variables sent along with a query.
pub type Variables = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub operations: Vec<OperationDefinition>,
    pub fragments: Vec<FragmentDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationDefinition {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

impl OperationDefinition {
    /// An anonymous query without variables or directives prints as a bare selection set.
    pub fn is_shorthand(&self) -> bool {
        self.kind == OperationKind::Query
            && self.name.is_none()
            && self.variables.is_empty()
            && self.directives.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: String,
    /// Printed type, e.g. `[ID!]!`
    pub var_type: String,
    pub default_value: Option<String>,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    pub items: Vec<Selection>,
}

impl SelectionSet {
    pub fn new(items: Vec<Selection>) -> Self {
        SelectionSet { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when a direct child field is named `name`. Aliases are not considered.
    pub fn has_field(&self, name: &str) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, Selection::Field(field) if field.name == name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// A bare leaf field, as injected by [add_fields].
    pub fn leaf(name: &str) -> Self {
        Field {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// The key under which this field shows up in a result object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.iter().any(|directive| directive.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    /// Printed literal, e.g. `"abc"`, `$id` or `{first: 3}`
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSpread {
    pub name: String,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

/// The two accepted query forms. Both normalize to the same [Document].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    Text(String),
    Tree(Document),
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<Document> for QueryInput {
    fn from(document: Document) -> Self {
        QueryInput::Tree(document)
    }
}

impl From<&Document> for QueryInput {
    fn from(document: &Document) -> Self {
        QueryInput::Tree(document.clone())
    }
}

/// Parse query text into a [Document]. Trees are returned as they are.
pub fn parse<Q: Into<QueryInput>>(query: Q) -> Result<Document, ClientError> {
    match query.into() {
        QueryInput::Text(text) => convert::parse_text(&text),
        QueryInput::Tree(document) => Ok(document),
    }
}

/// Canonical text form of a document. Structurally equal documents print identically.
pub fn print(document: &Document) -> String {
    document.to_string()
}

impl FromStr for Document {
    type Err = ClientError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        convert::parse_text(text)
    }
}

/// Primary key of the cache: the canonical printed query, plus canonical variables when present.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(document: &Document, variables: &Variables) -> Self {
        let mut key = print(document);
        if !variables.is_empty() {
            key.push_str("\n# variables ");
            write_canonical_json(&mut key, &Value::Object(variables.clone()));
        }
        QueryKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryKey {
    fn from(key: &str) -> Self {
        QueryKey(key.to_string())
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// JSON text with object keys sorted at every level, independent of map insertion order.
pub(crate) fn write_canonical_json(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));
            out.push('{');
            for (idx, (key, value)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                // Serializing a str can not fail
                let _ = write!(out, "{}:", Value::String(key.clone()));
                write_canonical_json(out, value);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical_json(out, item);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}
