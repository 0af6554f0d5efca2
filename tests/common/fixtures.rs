//! Backend payloads and mock endpoint helpers

use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Vendor list as the backend reports it
pub fn providers_json() -> Value {
    json!({
        "providers": [
            {"id": "amazon", "name": "Amazon", "configured": true, "implemented": true},
            {"id": "fnac", "name": "FNAC", "configured": false, "implemented": false},
            {"id": "free_mobile", "name": "Free Mobile", "configured": true, "implemented": true},
            {"id": "freebox", "name": "Freebox", "configured": true, "implemented": true},
            {"id": "bouygues", "name": "Bouygues Telecom", "configured": false, "implemented": true},
            {"id": "decathlon", "name": "Decathlon", "configured": false, "implemented": true},
            {"id": "leroy_merlin", "name": "Leroy Merlin", "configured": false, "implemented": true}
        ]
    })
}

/// `progress` payload
pub fn progress(current: u64, total: i64, message: &str) -> (&'static str, Value) {
    (
        "progress",
        json!({"current": current, "total": total, "message": message}),
    )
}

/// `done` payload for `count` invoices
pub fn done(count: u32) -> (&'static str, Value) {
    let files: Vec<String> = (1..=count)
        .map(|i| format!("factures/2024/facture_{:02}.pdf", i))
        .collect();
    (
        "done",
        json!({
            "success": true,
            "message": format!("{} facture(s) téléchargée(s)", count),
            "count": count,
            "files": files
        }),
    )
}

/// `error` payload, with or without the explicit challenge flag
pub fn stream_error(detail: &str, requires_otp: Option<bool>) -> (&'static str, Value) {
    let mut payload = json!({"detail": detail});
    if let Some(flag) = requires_otp {
        payload["requires_otp"] = json!(flag);
    }
    ("error", payload)
}

/// Frame events the way the backend writes them
pub fn sse_body(events: &[(&str, Value)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

/// 200 response carrying an event stream
pub fn sse_response(events: &[(&str, Value)]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_body(events))
}

/// Serve one download stream, then fall through to later mounts
pub async fn mount_download_once(server: &MockServer, events: &[(&str, Value)]) {
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(sse_response(events))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Serve a download stream only for an exact request body
pub async fn mount_download_for(server: &MockServer, body: Value, events: &[(&str, Value)]) {
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .and(body_json(body))
        .respond_with(sse_response(events))
        .mount(server)
        .await;
}

/// Serve a download stream after a delay
pub async fn mount_slow_download(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(sse_response(&[done(1)]).set_delay(delay))
        .mount(server)
        .await;
}

/// Backend status endpoint
pub async fn mount_status(server: &MockServer, status: &str, message: &str) {
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": status, "message": message})),
        )
        .mount(server)
        .await;
}

/// Vendor list endpoint
pub async fn mount_providers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(providers_json()))
        .mount(server)
        .await;
}

/// 2FA submission endpoint answering with the given result
pub async fn mount_submit_otp(
    server: &MockServer,
    code: &str,
    success: bool,
    message: &str,
    requires_otp: bool,
) {
    Mock::given(method("POST"))
        .and(path("/api/submit-otp"))
        .and(body_json(json!({"otp_code": code})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": success,
            "message": message,
            "requires_otp": requires_otp
        })))
        .expect(1)
        .mount(server)
        .await;
}
