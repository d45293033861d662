//! # quire-core
//!
//! A client-side query layer for GraphQL-style APIs with a normalized, cross-query-consistent
//! cache.
//!
//! ## Overview
//!
//! quire-core accepts declarative queries, splits off the fields marked for local resolution
//! (`@local` by default), sends the rest to a server, merges the locally resolved values back in,
//! and stores the result. Results are normalized: every object carrying a `__typename` and an
//! `id` is an **entity**, and the cache remembers which queries returned it. When a later write
//! changes an entity, every other query depending on it is re-run so that all of them agree.
//!
//! ### Key Features
//!
//! - **Local fields**: one depth-first pass strips local fields from the server query and
//!   records where their values belong
//! - **Normalization**: results are flattened into `"{typename}-{id}"` entities
//! - **Consistency**: structural diffs of entity snapshots drive re-runs of dependent queries
//! - **Reactive state**: each query owns a [`cache::StateCell`] subscribers can watch
//! - **Pluggable edges**: bring your own [`transport::Transport`] and
//!   [`resolver::ResolverRuntime`]
//!
//! ## Architecture
//!
//! - **[`query`]**: owned query tree, canonical printing, field and fragment rewrites
//! - **[`split`]**: separating server fields from local fields, producing a [`path_tree::PathTree`]
//! - **[`flatten`]**: entity extraction
//! - **[`cache`]**: `NormalizedCache` and `StateCell`
//! - **[`merge`]**: splicing local values into server results
//! - **[`client`]**: `QueryClient`, the orchestrator
//! - **[`event`]**: change notifications emitted by the cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quire_core::{
//!     cache::NormalizedCache,
//!     client::QueryClient,
//!     config::ClientConfig,
//!     query::Variables,
//!     resolver::ResolverTable,
//!     transport::{GraphQlRequest, Transport},
//!     ClientError,
//! };
//! use serde_json::{json, Value};
//!
//! struct Fixed;
//!
//! impl Transport for Fixed {
//!     async fn fetch(&self, _request: &GraphQlRequest) -> Result<Value, ClientError> {
//!         Ok(json!({ "user": { "__typename": "User", "id": 1, "name": "Al" } }))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), ClientError> {
//!     let resolvers = ResolverTable::new()
//!         .table("user", ResolverTable::new().leaf("online", |_| Ok(json!(true))));
//!     let client = QueryClient::new(
//!         ClientConfig::default(),
//!         Fixed,
//!         resolvers,
//!         NormalizedCache::new().into_shared(),
//!     );
//!
//!     let handle = client
//!         .query("{ user(id: 1) { name online @local } }", Variables::new())
//!         .await?;
//!     assert_eq!(handle.data().unwrap()["user"]["online"], json!(true));
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! All fallible operations return [`ClientError`]. Malformed queries fail immediately; failures
//! of the transport or of a resolver are recorded in the query's cell instead.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod flatten;
pub mod merge;
pub mod path_tree;
pub mod query;
pub mod resolver;
pub mod split;
#[cfg(test)]
mod tests;
pub mod transport;

pub use error::*;
