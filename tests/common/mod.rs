//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use parking_lot::Mutex;
use quire_core::{
    cache::{NormalizedCache, SharedCache},
    client::QueryClient,
    config::ClientConfig,
    resolver::ResolverTable,
    transport::{GraphQlRequest, Transport},
    ClientError,
};
use serde_json::{json, Value};
use std::{future::Future, sync::Arc};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times. Subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

type Handler = Box<dyn Fn(&GraphQlRequest) -> Result<Value, ClientError> + Send + Sync>;

/// In-process stand-in for a server. Answers through `handler` and records every request.
pub struct MockTransport {
    handler: Handler,
    calls: Mutex<Vec<GraphQlRequest>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&GraphQlRequest) -> Result<Value, ClientError> + Send + Sync + 'static,
    {
        MockTransport {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A server that is always down.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        MockTransport::new(move |_| Err(ClientError::Transport(message.clone())))
    }

    pub fn calls(&self) -> Vec<GraphQlRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests whose query text contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|request| request.query.contains(needle))
            .count()
    }
}

impl Transport for MockTransport {
    fn fetch(
        &self,
        request: &GraphQlRequest,
    ) -> impl Future<Output = Result<Value, ClientError>> + Send {
        self.calls.lock().push(request.clone());
        std::future::ready((self.handler)(request))
    }
}

/// Mutable server-side data shared between a test and its [MockTransport].
#[derive(Clone, Default)]
pub struct ServerState(Arc<Mutex<String>>);

#[allow(dead_code)]
impl ServerState {
    pub fn new(user_name: &str) -> Self {
        ServerState(Arc::new(Mutex::new(user_name.to_string())))
    }

    pub fn set_name(&self, user_name: &str) {
        *self.0.lock() = user_name.to_string();
    }

    pub fn name(&self) -> String {
        self.0.lock().clone()
    }

    /// `User-1` as the server currently knows it.
    pub fn user(&self) -> Value {
        json!({ "__typename": "User", "id": 1, "name": self.name() })
    }
}

/// A server with two root fields, `me` and `author`, both returning `User-1`, and a
/// `rename` mutation.
#[allow(dead_code)]
pub fn user_server(state: &ServerState) -> MockTransport {
    let state = state.clone();
    MockTransport::new(move |request| {
        if let Some(name) = request.variables.get("name").and_then(Value::as_str) {
            state.set_name(name);
            return Ok(json!({ "rename": state.user() }));
        }
        if request.query.contains("author") {
            Ok(json!({ "author": state.user() }))
        } else {
            Ok(json!({ "me": state.user() }))
        }
    })
}

#[allow(dead_code)]
pub fn client_with(
    transport: MockTransport,
    resolvers: ResolverTable,
) -> QueryClient<MockTransport, ResolverTable> {
    client_with_cache(transport, resolvers, NormalizedCache::new().into_shared())
}

#[allow(dead_code)]
pub fn client_with_cache(
    transport: MockTransport,
    resolvers: ResolverTable,
    cache: SharedCache,
) -> QueryClient<MockTransport, ResolverTable> {
    QueryClient::new(ClientConfig::default(), transport, resolvers, cache)
}
