use std::io;

use async_graphql_parser::Error as ParserError;
use http::Error as HttpError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;
use url::ParseError as UrlParseError;

use crate::event::CacheEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ClientError {
    #[error("Query syntax error: {0}")]
    Syntax(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Query is not cached: {0}")]
    QueryNotCached(String),
    #[error("Cyclic invalidation through queries: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    #[error("Local resolver error: {0}")]
    Resolver(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Errors that are recorded into a query's cell instead of being returned to the caller.
    pub fn is_recordable(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Resolver(_))
    }

    /// Any error raised while fetching is a transport failure.
    pub fn into_transport(self) -> ClientError {
        match self {
            ClientError::Transport(_) => self,
            other => ClientError::Transport(other.to_string()),
        }
    }

    /// Any error raised while resolving local fields is a resolver failure.
    pub fn into_resolver(self) -> ClientError {
        match self {
            ClientError::Resolver(_) => self,
            other => ClientError::Resolver(other.to_string()),
        }
    }
}

impl From<ParserError> for ClientError {
    fn from(src: ParserError) -> ClientError {
        ClientError::Syntax(format!("{src}"))
    }
}

impl From<JsonError> for ClientError {
    fn from(src: JsonError) -> ClientError {
        ClientError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(src: toml::de::Error) -> ClientError {
        ClientError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(src: toml::ser::Error) -> ClientError {
        ClientError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<UrlParseError> for ClientError {
    fn from(src: UrlParseError) -> ClientError {
        ClientError::Config(format!("Invalid URL: {src}"))
    }
}

impl From<HttpError> for ClientError {
    fn from(src: HttpError) -> ClientError {
        ClientError::Transport(format!("Could not build HTTP request: {src}"))
    }
}

impl From<io::Error> for ClientError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ClientError::NotFound(format!("{x}")),
            _ => ClientError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<TokioSendError<CacheEvent>> for ClientError {
    fn from(x: TokioSendError<CacheEvent>) -> Self {
        ClientError::Io(format!(
            "Channel update send Error, could not transmit cache event {:?}",
            x.0
        ))
    }
}
