use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};
use tokio::sync::mpsc::UnboundedSender;

use super::cell::{QueryState, StateCell};
use crate::{
    error::ClientError,
    event::CacheEvent,
    flatten::{EntityKey, FlattenedResult},
    query::QueryKey,
};

/// Handle through which the client and its callers share one cache.
pub type SharedCache = Arc<RwLock<NormalizedCache>>;

/// Outcome of reconciling a write against the stored entity snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    /// Entities whose stored snapshot differed from the written one
    pub changed: BTreeSet<EntityKey>,
    /// Queries depending on a changed entity, excluding the writer
    pub queries: BTreeSet<QueryKey>,
}

impl Invalidation {
    /// Nothing changed and nothing needs to re-run.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.queries.is_empty()
    }
}

/// Normalized store of query results.
///
/// Holds three indices:
///
/// - `query_cells`: one [StateCell] per query key, created on first use and kept until evicted;
/// - `entity_snapshots`: the last written state of every entity seen in a result;
/// - `dependents`: which queries have returned each entity.
///
/// Every write compares the incoming entities against their snapshots. Only the fields both
/// carry are compared, so queries selecting different fields of one entity do not disturb each
/// other. The stored snapshot keeps every field ever written, the latest value winning. The
/// queries depending on an entity that changed are reported back so they can be re-run.
#[derive(Default)]
pub struct NormalizedCache {
    query_cells: BTreeMap<QueryKey, StateCell>,
    entity_snapshots: BTreeMap<EntityKey, Value>,
    dependents: BTreeMap<EntityKey, BTreeSet<QueryKey>>,
    writes: u64,
    event_tx: Option<UnboundedSender<CacheEvent>>,
}

impl fmt::Debug for NormalizedCache {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NormalizedCache")
            .field("query_cells", &self.query_cells)
            .field("entity_snapshots", &self.entity_snapshots)
            .field("dependents", &self.dependents)
            .field("writes", &self.writes)
            .field("events", &self.event_tx.is_some())
            .finish()
    }
}

impl NormalizedCache {
    pub fn new() -> Self {
        NormalizedCache::default()
    }

    /// Send a [CacheEvent] for every change to `tx`.
    pub fn with_events(tx: UnboundedSender<CacheEvent>) -> Self {
        NormalizedCache {
            event_tx: Some(tx),
            ..Default::default()
        }
    }

    pub fn into_shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    /// The cell for `key`, created in the loading state if it does not exist yet.
    pub fn cell(&mut self, key: &QueryKey) -> StateCell {
        self.query_cells.entry(key.clone()).or_default().clone()
    }

    /// The cell for `key`, if the query has been executed before.
    pub fn get_cell(&self, key: &QueryKey) -> Option<StateCell> {
        self.query_cells.get(key).cloned()
    }

    pub fn read(&self, key: &QueryKey) -> Result<QueryState, ClientError> {
        self.query_cells
            .get(key)
            .map(StateCell::read)
            .ok_or_else(|| ClientError::QueryNotCached(key.to_string()))
    }

    /// A settled, error free result is available for `key`.
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.query_cells
            .get(key)
            .is_some_and(|cell| cell.read().is_fresh())
    }

    /// Store `state` for `key` and reconcile the entities of its result.
    ///
    /// When `state` carries no data only the cell is updated. Otherwise `key` is recorded as a
    /// dependent of every entity in `flattened`, the snapshots absorb its fields, and the other
    /// queries depending on an entity that changed are returned.
    pub fn write(
        &mut self,
        key: &QueryKey,
        state: QueryState,
        flattened: &FlattenedResult,
    ) -> Invalidation {
        if state.data.is_none() {
            let failed = state.has_error;
            self.cell(key).write(state);
            if failed {
                tracing::debug!("[NormalizedCache::write] query failed:\n{}", key);
                self.emit(CacheEvent::QueryFailed(key.clone()));
            }
            return Invalidation::default();
        }

        for entity in flattened.keys() {
            self.dependents
                .entry(entity.clone())
                .or_default()
                .insert(key.clone());
        }
        let invalidation = self.reconcile(Some(key), flattened);
        self.cell(key).write(state);
        tracing::debug!(
            "[NormalizedCache::write] {} entities, {} changed, {} queries invalidated",
            flattened.len(),
            invalidation.changed.len(),
            invalidation.queries.len()
        );
        self.emit(CacheEvent::QueryWritten(key.clone()));
        self.emit_invalidation(Some(key), &invalidation);
        invalidation
    }

    /// Reconcile entities that did not arrive as the result of a cached query, e.g. the payload
    /// of a mutation. No cell is written and no dependents are recorded.
    pub fn write_entities(
        &mut self,
        origin: Option<&QueryKey>,
        flattened: &FlattenedResult,
    ) -> Invalidation {
        let invalidation = self.reconcile(origin, flattened);
        tracing::debug!(
            "[NormalizedCache::write_entities] {} entities, {} changed",
            flattened.len(),
            invalidation.changed.len()
        );
        self.emit_invalidation(origin, &invalidation);
        invalidation
    }

    fn reconcile(
        &mut self,
        origin: Option<&QueryKey>,
        flattened: &FlattenedResult,
    ) -> Invalidation {
        let mut invalidation = Invalidation::default();
        if self.writes > 0 {
            for (entity, snapshot) in flattened.iter() {
                let changed = self
                    .entity_snapshots
                    .get(entity)
                    .is_some_and(|previous| differs(previous, snapshot));
                if changed {
                    invalidation.changed.insert(entity.clone());
                }
            }
        }
        for entity in invalidation.changed.iter() {
            if let Some(queries) = self.dependents.get(entity) {
                invalidation.queries.extend(
                    queries
                        .iter()
                        .filter(|query| Some(*query) != origin)
                        .cloned(),
                );
            }
        }
        for (entity, snapshot) in flattened.iter() {
            match self.entity_snapshots.get_mut(entity) {
                Some(stored) => absorb(stored, snapshot),
                None => {
                    self.entity_snapshots.insert(entity.clone(), snapshot.clone());
                }
            }
        }
        self.writes += 1;
        invalidation
    }

    /// Forget everything known about `key`. Entities no remaining query depends on are dropped
    /// along with it. Returns false when the query was not cached.
    pub fn evict(&mut self, key: &QueryKey) -> bool {
        let existed = self.query_cells.remove(key).is_some();
        self.dependents.retain(|_, queries| {
            queries.remove(key);
            !queries.is_empty()
        });
        let dependents = &self.dependents;
        self.entity_snapshots
            .retain(|entity, _| dependents.contains_key(entity));
        if existed {
            tracing::debug!("[NormalizedCache::evict] evicted:\n{}", key);
            self.emit(CacheEvent::QueryEvicted(key.clone()));
        }
        existed
    }

    pub fn snapshot(&self, entity: &EntityKey) -> Option<&Value> {
        self.entity_snapshots.get(entity)
    }

    pub fn dependents_of(&self, entity: &EntityKey) -> BTreeSet<QueryKey> {
        self.dependents.get(entity).cloned().unwrap_or_default()
    }

    pub fn query_keys(&self) -> Vec<QueryKey> {
        self.query_cells.keys().cloned().collect()
    }

    pub fn entity_keys(&self) -> Vec<EntityKey> {
        self.entity_snapshots.keys().cloned().collect()
    }

    /// Number of cached queries.
    pub fn len(&self) -> usize {
        self.query_cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query_cells.is_empty()
    }

    fn emit_invalidation(&self, by: Option<&QueryKey>, invalidation: &Invalidation) {
        for entity in invalidation.changed.iter() {
            self.emit(CacheEvent::EntityChanged(entity.clone()));
        }
        for query in invalidation.queries.iter() {
            self.emit(CacheEvent::QueryInvalidated {
                query: query.clone(),
                by: by.cloned(),
            });
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.send(event).map_err(ClientError::from) {
                tracing::warn!("[NormalizedCache] dropping event: {}", e);
            }
        }
    }
}

/// Deep comparison restricted to what both sides selected. Objects only compare their shared
/// fields; arrays differ when their lengths do or any pair of elements does.
fn differs(previous: &Value, next: &Value) -> bool {
    match (previous, next) {
        (Value::Object(previous), Value::Object(next)) => next.iter().any(|(field, value)| {
            previous
                .get(field)
                .is_some_and(|stored| differs(stored, value))
        }),
        (Value::Array(previous), Value::Array(next)) => {
            previous.len() != next.len()
                || previous.iter().zip(next.iter()).any(|(a, b)| differs(a, b))
        }
        (previous, next) => previous != next,
    }
}

/// Field-wise union of two snapshots of the same entity; fields of `next` win.
fn absorb(stored: &mut Value, next: &Value) {
    match (stored, next) {
        (Value::Object(stored), Value::Object(next)) => {
            for (field, value) in next.iter() {
                stored.insert(field.clone(), value.clone());
            }
        }
        (stored, next) => *stored = next.clone(),
    }
}
