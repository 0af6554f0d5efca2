use super::*;
use wiremock::{MockServer, ResponseTemplate};


/// Client pointed at a mock backend
pub(super) fn client_for(server: &MockServer) -> ApiClient {
    client_at(&server.uri())
}

pub(super) fn client_at(base_url: &str) -> ApiClient {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    ApiClient::new(&config).unwrap()
}

/// Backend that answers one request with `head` and then keeps the connection
/// open without sending anything else
///
/// Returns the base URL to point a client at.
pub(super) async fn stalled_backend(head: Vec<u8>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket.write_all(&head).await.unwrap();
        socket.flush().await.unwrap();
        // hold the connection open until the test runtime shuts down
        std::future::pending::<()>().await;
        drop(socket);
    });
    format!("http://{}", addr)
}

/// Render `(event, payload)` pairs the way the backend frames them
pub(super) fn sse_body(events: &[(&str, serde_json::Value)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

/// 200 response carrying an event stream
pub(super) fn sse_response(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.into())
}

#[test]
fn base_url_gets_trailing_slash() {
    let url = normalize_base_url("http://localhost:8001/backend").unwrap();
    assert_eq!(url.as_str(), "http://localhost:8001/backend/");
    assert_eq!(
        url.join("api/download").unwrap().as_str(),
        "http://localhost:8001/backend/api/download"
    );
}

#[test]
fn invalid_base_url_is_config_error() {
    match normalize_base_url("not a url") {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("api.base_url")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn detail_prefers_string_detail() {
    assert_eq!(
        detail_from_body(r#"{"detail": "Le fournisseur 'fnac' n'est pas encore implémenté"}"#),
        Some("Le fournisseur 'fnac' n'est pas encore implémenté".to_string())
    );
}

#[test]
fn detail_serializes_structured_detail() {
    let detail = detail_from_body(r#"{"detail": [{"loc": ["body", "max_invoices"]}]}"#).unwrap();
    assert!(detail.contains("max_invoices"));
}

#[test]
fn detail_missing_or_blank_falls_back() {
    assert_eq!(detail_from_body("<html>502</html>"), None);
    assert_eq!(detail_from_body(r#"{"error": "x"}"#), None);
    assert_eq!(detail_from_body(r#"{"detail": "  "}"#), None);
    assert_eq!(detail_from_body(r#"{"detail": null}"#), None);
}
