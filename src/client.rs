//! [QueryClient]: the orchestrator tying the query pipeline together.
//!
//! Every execution walks the same phases:
//!
//! ```text
//! Idle -> Parsing -> Fetching  -> Resolving -> Merging -> Caching -> Done
//!                 \-> SkipFetch -/             (skipped when nothing is local)
//! ```
//!
//! `Fetching` and `Resolving` may end in `Failed`, in which case the failure is recorded in the
//! query's cell. A fresh cell short-circuits from `Parsing` straight to `Done` unless the run is
//! forced. After a successful write, every query the write invalidated is re-run in turn; the
//! chain of queries that led to each re-run is tracked so that feedback loops are reported
//! instead of followed forever.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, VecDeque},
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::{
    cache::{Invalidation, QueryState, SharedCache, StateCell},
    config::ClientConfig,
    error::ClientError,
    flatten::{flatten, EntityIdentity},
    merge::merge,
    query::{add_fields, inline_fragments, parse, print, Document, QueryInput, QueryKey, Variables},
    resolver::{ResolverRuntime, ResolverTable},
    split::{split, SplitQuery},
    transport::{GraphQlRequest, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryPhase {
    Idle,
    Parsing,
    Fetching,
    /// Nothing to send to the server
    SkipFetch,
    Resolving,
    Merging,
    Caching,
    Done,
    Failed,
}

impl QueryPhase {
    pub fn can_transition_to(&self, next: QueryPhase) -> bool {
        use QueryPhase::*;
        matches!(
            (self, next),
            (Idle, Parsing)
                | (Parsing, Fetching)
                | (Parsing, SkipFetch)
                | (Parsing, Done)
                | (Fetching, Resolving)
                | (Fetching, Caching)
                | (Fetching, Failed)
                | (SkipFetch, Resolving)
                | (SkipFetch, Caching)
                | (Resolving, Merging)
                | (Resolving, Failed)
                | (Merging, Caching)
                | (Caching, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryPhase::Done | QueryPhase::Failed)
    }
}

impl Display for QueryPhase {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Tracks the phase of one execution.
struct PhaseTracker {
    label: String,
    phase: QueryPhase,
}

impl PhaseTracker {
    fn new(label: String) -> Self {
        PhaseTracker {
            label,
            phase: QueryPhase::Idle,
        }
    }

    fn advance(&mut self, next: QueryPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(
                "[QueryClient] unexpected transition {} -> {} for {}",
                self.phase,
                next,
                self.label
            );
        } else {
            tracing::debug!(
                "[QueryClient] {} -> {} for {}",
                self.phase,
                next,
                self.label
            );
        }
        self.phase = next;
    }
}

/// A query after the `Parsing` phase, kept around so it can be re-run on invalidation.
#[derive(Debug, Clone)]
struct PreparedQuery {
    key: QueryKey,
    split: SplitQuery,
    request: GraphQlRequest,
}

impl PreparedQuery {
    fn variables(&self) -> &Variables {
        &self.request.variables
    }

    fn label(&self) -> String {
        match &self.request.operation_name {
            Some(name) => name.clone(),
            None => self
                .key
                .as_str()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// What [QueryClient::query] hands back: the query's key, its cell, and the state it settled in.
#[derive(Debug, Clone)]
pub struct QueryHandle {
    pub key: QueryKey,
    pub cell: StateCell,
    pub state: QueryState,
}

impl QueryHandle {
    pub fn data(&self) -> Option<&Value> {
        self.state.data.as_ref()
    }
}

/// Executes queries against a [Transport] and a [ResolverRuntime], keeping the results in a
/// [SharedCache].
pub struct QueryClient<T, R = ResolverTable> {
    config: Arc<ClientConfig>,
    identity: EntityIdentity,
    transport: T,
    resolver: R,
    cache: SharedCache,
    registry: RwLock<BTreeMap<QueryKey, PreparedQuery>>,
}

impl<T: Transport, R: ResolverRuntime> QueryClient<T, R> {
    pub fn new(config: ClientConfig, transport: T, resolver: R, cache: SharedCache) -> Self {
        QueryClient {
            identity: config.identity(),
            config: Arc::new(config),
            transport,
            resolver,
            cache,
            registry: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Execute `query`, or return its cached state when a fresh one exists.
    ///
    /// Parse errors are returned. Transport and resolver failures are not: they are recorded in
    /// the query's cell and show up in the returned [QueryHandle::state].
    #[tracing::instrument(skip_all)]
    pub async fn query<Q: Into<QueryInput>>(
        &self,
        query: Q,
        variables: Variables,
    ) -> Result<QueryHandle, ClientError> {
        self.run(query.into(), variables, false).await
    }

    /// Re-execute a query regardless of the cached state.
    #[tracing::instrument(skip_all)]
    pub async fn refetch<Q: Into<QueryInput>>(
        &self,
        query: Q,
        variables: Variables,
    ) -> Result<QueryHandle, ClientError> {
        self.run(query.into(), variables, true).await
    }

    /// Cached state of a previously executed query.
    pub fn read_query<Q: Into<QueryInput>>(
        &self,
        query: Q,
        variables: Variables,
    ) -> Result<ReadQuery<'_, T, R>, ClientError> {
        let document = parse(query)?;
        let key = QueryKey::new(&document, &variables);
        let state = self.cache.read().read(&key)?;
        Ok(ReadQuery {
            client: self,
            key,
            state,
        })
    }

    /// Send a mutation. Entities in the payload are reconciled with the cache, and the queries
    /// depending on any that changed are re-run. The mutation itself is not cached.
    #[tracing::instrument(skip_all)]
    pub async fn mutate<Q: Into<QueryInput>>(
        &self,
        mutation: Q,
        variables: Variables,
    ) -> Result<QueryState, ClientError> {
        let mut tracker = PhaseTracker::new("mutation".to_string());
        tracker.advance(QueryPhase::Parsing);
        let prepared = self.prepare(mutation.into(), variables)?;
        tracker.label = prepared.label();

        let data = match self.fetch_and_resolve(&prepared, &mut tracker).await {
            Ok(data) => data,
            Err(e) if e.is_recordable() => return Ok(QueryState::failed(e)),
            Err(e) => return Err(e),
        };
        tracker.advance(QueryPhase::Caching);
        let flattened = flatten(&data, &self.identity);
        let invalidation = self.cache.write().write_entities(None, &flattened);
        tracker.advance(QueryPhase::Done);
        self.propagate(None, invalidation).await?;
        Ok(QueryState::ready(data))
    }

    /// Drop a query from the cache. Returns false when it was not cached.
    pub fn evict(&self, key: &QueryKey) -> bool {
        self.registry.write().remove(key);
        self.cache.write().evict(key)
    }

    async fn run(
        &self,
        input: QueryInput,
        variables: Variables,
        force: bool,
    ) -> Result<QueryHandle, ClientError> {
        let prepared = self.prepare(input, variables)?;
        let key = prepared.key.clone();
        self.registry.write().insert(key.clone(), prepared.clone());

        let invalidation = self.execute(&prepared, force).await?;
        self.propagate(Some(key.clone()), invalidation).await?;

        let cell = self.cache.write().cell(&key);
        let state = cell.read();
        Ok(QueryHandle { key, cell, state })
    }

    /// Parse, inline fragments, split off local fields and inject the configured fields into
    /// what is sent to the server.
    fn prepare(&self, input: QueryInput, variables: Variables) -> Result<PreparedQuery, ClientError> {
        let document = parse(input)?;
        let key = QueryKey::new(&document, &variables);
        let inlined = inline_fragments(&document)?;
        let mut split = split(&inlined, &self.config.local_directive);
        if !self.config.inject_fields.is_empty() {
            split.server_tree = add_fields(&split.server_tree, &self.config.inject_fields);
        }
        let request = GraphQlRequest {
            query: print(&split.server_tree),
            variables,
            operation_name: operation_name(&document),
        };
        Ok(PreparedQuery {
            key,
            split,
            request,
        })
    }

    /// Run the query once and write the outcome to its cell.
    async fn execute(
        &self,
        prepared: &PreparedQuery,
        force: bool,
    ) -> Result<Invalidation, ClientError> {
        let key = &prepared.key;
        let mut tracker = PhaseTracker::new(prepared.label());
        tracker.advance(QueryPhase::Parsing);

        if !force && self.cache.read().is_fresh(key) {
            tracker.advance(QueryPhase::Done);
            return Ok(Invalidation::default());
        }

        let cell = self.cache.write().cell(key);
        if prepared.split.send_to_server {
            cell.update(|state| state.loading = true);
        }

        match self.fetch_and_resolve(prepared, &mut tracker).await {
            Ok(data) => {
                tracker.advance(QueryPhase::Caching);
                let flattened = flatten(&data, &self.identity);
                let invalidation =
                    self.cache
                        .write()
                        .write(key, QueryState::ready(data), &flattened);
                tracker.advance(QueryPhase::Done);
                Ok(invalidation)
            }
            Err(e) => {
                tracing::warn!("[QueryClient] {} failed: {}", tracker.label, e);
                let recordable = e.is_recordable();
                self.cache.write().write(
                    key,
                    QueryState::failed(e.clone()),
                    &Default::default(),
                );
                if recordable {
                    Ok(Invalidation::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// The `Fetching`/`SkipFetch`, `Resolving` and `Merging` phases.
    async fn fetch_and_resolve(
        &self,
        prepared: &PreparedQuery,
        tracker: &mut PhaseTracker,
    ) -> Result<Value, ClientError> {
        let server_data = if prepared.split.send_to_server {
            tracker.advance(QueryPhase::Fetching);
            match self.transport.fetch(&prepared.request).await {
                Ok(data) => Some(data),
                Err(e) => {
                    tracker.advance(QueryPhase::Failed);
                    return Err(e.into_transport());
                }
            }
        } else {
            tracker.advance(QueryPhase::SkipFetch);
            None
        };

        let path_tree = &prepared.split.path_tree;
        let resolved = if path_tree.has_pending() {
            tracker.advance(QueryPhase::Resolving);
            match self
                .resolver
                .resolve_local_fields(path_tree.clone(), server_data.as_ref(), prepared.variables())
                .await
            {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    tracker.advance(QueryPhase::Failed);
                    return Err(e.into_resolver());
                }
            }
        } else {
            None
        };

        let mut data = server_data.unwrap_or_else(|| Value::Object(Map::new()));
        if let Some(resolved) = resolved {
            tracker.advance(QueryPhase::Merging);
            merge(&mut data, &resolved);
        }
        Ok(data)
    }

    /// Re-run every invalidated query until no write changes anything any more.
    async fn propagate(
        &self,
        origin: Option<QueryKey>,
        invalidation: Invalidation,
    ) -> Result<(), ClientError> {
        let root_chain = origin.into_iter().collect::<Vec<_>>();
        let mut work = invalidation
            .queries
            .into_iter()
            .map(|key| (key, root_chain.clone()))
            .collect::<VecDeque<_>>();

        while let Some((key, chain)) = work.pop_front() {
            if chain.contains(&key) || chain.len() >= self.config.max_invalidation_depth {
                let mut cycle = chain.iter().map(ToString::to_string).collect::<Vec<_>>();
                cycle.push(key.to_string());
                tracing::warn!(
                    "[QueryClient] invalidation chain of {} queries aborted",
                    cycle.len()
                );
                return Err(ClientError::CyclicDependency(cycle));
            }
            let Some(prepared) = self.registry.read().get(&key).cloned() else {
                tracing::debug!("[QueryClient] skipping re-run of unknown query:\n{}", key);
                continue;
            };
            let next = self.execute(&prepared, true).await?;
            let mut next_chain = chain;
            next_chain.push(key);
            for query in next.queries {
                work.push_back((query, next_chain.clone()));
            }
        }
        Ok(())
    }
}

/// Name of the first named operation, as sent in the request envelope.
fn operation_name(document: &Document) -> Option<String> {
    document.operations.iter().find_map(|op| op.name.clone())
}

/// Cached state of a query plus a way to overwrite it.
pub struct ReadQuery<'c, T, R> {
    client: &'c QueryClient<T, R>,
    key: QueryKey,
    state: QueryState,
}

impl<'c, T: Transport, R: ResolverRuntime> ReadQuery<'c, T, R> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn data(&self) -> Option<&Value> {
        self.state.data.as_ref()
    }

    /// Replace the cached result. Other queries sharing an entity that changed are re-run; this
    /// one is not.
    pub async fn write(&self, data: Value) -> Result<(), ClientError> {
        let flattened = flatten(&data, &self.client.identity);
        let invalidation =
            self.client
                .cache
                .write()
                .write(&self.key, QueryState::ready(data), &flattened);
        self.client
            .propagate(Some(self.key.clone()), invalidation)
            .await
    }
}
