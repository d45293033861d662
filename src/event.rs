use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{flatten::EntityKey, query::QueryKey};

/// Notifications emitted by [crate::cache::NormalizedCache] whenever one of its indices changes.
///
/// Events are informational: the cache has already applied the change when the event is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEvent {
    /// A query cell received data
    QueryWritten(QueryKey),
    /// A query cell was moved into the failed state
    QueryFailed(QueryKey),
    /// A field the stored snapshot of an entity already held was written with a different value
    EntityChanged(EntityKey),
    /// `query` has to be re-run because a write performed by `by` changed one of its entities.
    /// `by` is None when the write came from a mutation.
    QueryInvalidated {
        query: QueryKey,
        by: Option<QueryKey>,
    },
    /// Cell and dependency entries were removed for the query
    QueryEvicted(QueryKey),
}

impl CacheEvent {
    /// The query this event is about, if any.
    pub fn query(&self) -> Option<&QueryKey> {
        match self {
            CacheEvent::QueryWritten(key) => Some(key),
            CacheEvent::QueryFailed(key) => Some(key),
            CacheEvent::EntityChanged(_) => None,
            CacheEvent::QueryInvalidated { query, .. } => Some(query),
            CacheEvent::QueryEvicted(key) => Some(key),
        }
    }
}

impl Display for CacheEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CacheEvent::QueryWritten(_) => write!(f, "QueryWritten"),
            CacheEvent::QueryFailed(_) => write!(f, "QueryFailed"),
            CacheEvent::EntityChanged(key) => write!(f, "EntityChanged({key})"),
            CacheEvent::QueryInvalidated { .. } => write!(f, "QueryInvalidated"),
            CacheEvent::QueryEvicted(_) => write!(f, "QueryEvicted"),
        }
    }
}
