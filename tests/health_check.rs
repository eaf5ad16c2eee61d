//! Integration tests for the server plumbing

mod common;

use common::spawn_app;

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/health_check", &app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn request_id_is_generated_when_absent() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/health_check", &app.address))
        .send()
        .await
        .expect("Failed to execute request");

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Missing x-request-id header");
    assert!(!request_id.is_empty());
}

#[tokio::test]
async fn inbound_request_id_is_echoed() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/health_check", &app.address))
        .header("x-request-id", "trace-abc-123")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-abc-123"
    );
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/does-not-exist", &app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
