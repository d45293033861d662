//! Network boundary of the client.
//!
//! [Transport] is the only thing [crate::client::QueryClient] knows about the server: it takes a
//! printed query plus variables and returns the full `data` payload or an error. [HttpTransport]
//! wraps the GraphQL-over-HTTP envelope around any [HttpClient].

use http::{header, Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, future::Future};
use url::Url;

use crate::{config::ClientConfig, error::ClientError, query::Variables};

/// A query as it goes over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Variables::is_empty")]
    pub variables: Variables,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    /// The data payload. Any reported error fails the whole response.
    pub fn into_result(self) -> Result<Value, ClientError> {
        if !self.errors.is_empty() {
            let messages = self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>();
            return Err(ClientError::Transport(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| ClientError::Transport("Response carried no data".to_string()))
    }
}

pub trait Transport: Sync {
    fn fetch(
        &self,
        request: &GraphQlRequest,
    ) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

/// Sends raw HTTP requests. Implement this for the HTTP stack of the host application.
pub trait HttpClient: Sync {
    fn send(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl Future<Output = Result<Response<Vec<u8>>, ClientError>> + Send;
}

/// [Transport] speaking JSON over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpTransport<C> {
    client: C,
    endpoint: Url,
    headers: BTreeMap<String, String>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Uses the endpoint and headers of `config`; fails when no endpoint is configured.
    pub fn new(client: C, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(HttpTransport {
            client,
            endpoint: config.endpoint_url()?,
            headers: config.headers.clone(),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn build_request(&self, request: &GraphQlRequest) -> Result<Request<Vec<u8>>, ClientError> {
        let body = serde_json::to_vec(request)?;
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        for (name, value) in self.headers.iter() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder.body(body)?)
    }

    pub fn parse_response(response: Response<Vec<u8>>) -> Result<Value, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "Server responded with {}",
                status_text(status)
            )));
        }
        let envelope: GraphQlResponse = serde_json::from_slice(response.body())
            .map_err(|e| ClientError::Transport(format!("Malformed response body: {e}")))?;
        envelope.into_result()
    }
}

fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn fetch(
        &self,
        request: &GraphQlRequest,
    ) -> impl Future<Output = Result<Value, ClientError>> + Send {
        let built = self.build_request(request);
        async move {
            let response = self.client.send(built?).await?;
            tracing::debug!("[HttpTransport] {} -> {}", self.endpoint, response.status());
            Self::parse_response(response)
        }
    }
}
