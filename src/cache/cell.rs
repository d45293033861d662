use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use tokio::sync::watch;

use crate::error::ClientError;

/// What a subscriber of a query sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub loading: bool,
    pub data: Option<Value>,
    pub has_error: bool,
    pub error: Option<ClientError>,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState::loading()
    }
}

impl QueryState {
    pub fn loading() -> Self {
        QueryState {
            loading: true,
            data: None,
            has_error: false,
            error: None,
        }
    }

    pub fn ready(data: Value) -> Self {
        QueryState {
            loading: false,
            data: Some(data),
            has_error: false,
            error: None,
        }
    }

    pub fn failed(error: ClientError) -> Self {
        QueryState {
            loading: false,
            data: None,
            has_error: true,
            error: Some(error),
        }
    }

    /// Settled with data and without an error.
    pub fn is_fresh(&self) -> bool {
        !self.loading && !self.has_error && self.data.is_some()
    }
}

/// Reactive container for one query's state.
///
/// Clones share the same underlying value; every [StateCell::write] wakes all receivers handed
/// out by [StateCell::subscribe].
#[derive(Clone)]
pub struct StateCell(Arc<watch::Sender<QueryState>>);

impl StateCell {
    pub fn new(initial: QueryState) -> Self {
        let (tx, _) = watch::channel(initial);
        StateCell(Arc::new(tx))
    }

    /// Snapshot of the current state.
    pub fn read(&self) -> QueryState {
        self.0.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.0.subscribe()
    }

    /// Replace the state. Subscribers are notified even when nobody is listening yet.
    pub fn write(&self, state: QueryState) {
        self.0.send_replace(state);
    }

    /// Modify the state in place.
    pub fn update<F: FnOnce(&mut QueryState)>(&self, modify: F) {
        self.0.send_modify(modify);
    }

    /// True when both handles point at the same cell.
    pub fn same_cell(&self, other: &StateCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        StateCell::new(QueryState::loading())
    }
}

impl Debug for StateCell {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("StateCell").field(&*self.0.borrow()).finish()
    }
}
