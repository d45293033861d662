//! HttpTransport envelope tests against a recording HttpClient.

use http::{Request, Response, StatusCode};
use parking_lot::Mutex;
use quire_core::{
    config::ClientConfig,
    query::Variables,
    transport::{GraphQlRequest, HttpClient, HttpTransport, Transport},
    ClientError,
};
use serde_json::{json, Value};
use std::future::Future;
use test_log::test;

struct RecordingClient {
    status: StatusCode,
    body: Vec<u8>,
    sent: Mutex<Vec<Request<Vec<u8>>>>,
}

impl RecordingClient {
    fn new(status: StatusCode, body: &str) -> Self {
        RecordingClient {
            status,
            body: body.as_bytes().to_vec(),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl HttpClient for RecordingClient {
    fn send(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl Future<Output = Result<Response<Vec<u8>>, ClientError>> + Send {
        self.sent.lock().push(request);
        let response = Response::builder()
            .status(self.status)
            .body(self.body.clone())
            .map_err(ClientError::from);
        std::future::ready(response)
    }
}

fn config() -> ClientConfig {
    let mut config = ClientConfig::default().with_endpoint("https://api.example.com/graphql");
    config
        .headers
        .insert("authorization".to_string(), "Bearer abc".to_string());
    config
}

fn request() -> GraphQlRequest {
    let mut variables = Variables::new();
    variables.insert("id".to_string(), json!(7));
    GraphQlRequest {
        query: "query Pet($id: ID!) {\n  pet(id: $id) {\n    name\n  }\n}".to_string(),
        variables,
        operation_name: Some("Pet".to_string()),
    }
}

#[test(tokio::test)]
async fn test_request_envelope() {
    let transport = HttpTransport::new(
        RecordingClient::new(StatusCode::OK, r#"{"data":{"pet":{"name":"Rex"}}}"#),
        &config(),
    )
    .unwrap();
    let data = transport.fetch(&request()).await.unwrap();
    assert_eq!(data, json!({ "pet": { "name": "Rex" } }));

    let sent = transport_sent(&transport);
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.uri, "https://api.example.com/graphql");
    assert_eq!(sent.content_type.as_deref(), Some("application/json"));
    assert_eq!(sent.authorization.as_deref(), Some("Bearer abc"));
    assert_eq!(
        sent.body,
        json!({
            "query": request().query,
            "variables": { "id": 7 },
            "operationName": "Pet"
        })
    );
}

#[test(tokio::test)]
async fn test_error_status_is_a_transport_error() {
    let transport = HttpTransport::new(
        RecordingClient::new(StatusCode::BAD_GATEWAY, "upstream down"),
        &config(),
    )
    .unwrap();
    let result = transport.fetch(&request()).await;
    assert!(matches!(result, Err(ClientError::Transport(msg)) if msg.contains("502")));
}

#[test(tokio::test)]
async fn test_graphql_errors_are_transport_errors() {
    let transport = HttpTransport::new(
        RecordingClient::new(
            StatusCode::OK,
            r#"{"data":null,"errors":[{"message":"pet not found"},{"message":"try again"}]}"#,
        ),
        &config(),
    )
    .unwrap();
    let result = transport.fetch(&request()).await;
    assert_eq!(
        result,
        Err(ClientError::Transport("pet not found; try again".to_string()))
    );
}

#[test(tokio::test)]
async fn test_malformed_body_is_a_transport_error() {
    let transport = HttpTransport::new(
        RecordingClient::new(StatusCode::OK, "<html>"),
        &config(),
    )
    .unwrap();
    assert!(matches!(
        transport.fetch(&request()).await,
        Err(ClientError::Transport(_))
    ));
}

#[test]
fn test_missing_endpoint_is_a_config_error() {
    let result = HttpTransport::new(
        RecordingClient::new(StatusCode::OK, "{}"),
        &ClientConfig::default(),
    );
    assert!(matches!(result, Err(ClientError::Config(_))));
}

#[test]
fn test_empty_variables_are_omitted() {
    let body = serde_json::to_value(GraphQlRequest {
        query: "{ a }".to_string(),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(body, json!({ "query": "{ a }" }));
}

struct SentRequest {
    method: String,
    uri: String,
    content_type: Option<String>,
    authorization: Option<String>,
    body: Value,
}

fn transport_sent(transport: &HttpTransport<RecordingClient>) -> SentRequest {
    let sent = transport.client().sent.lock();
    let request = sent.last().expect("a request was sent");
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    };
    SentRequest {
        method: request.method().to_string(),
        uri: request.uri().to_string(),
        content_type: header("content-type"),
        authorization: header("authorization"),
        body: serde_json::from_slice(request.body()).unwrap(),
    }
}
