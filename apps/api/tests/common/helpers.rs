//! Request helpers for driving the router with `oneshot`

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

/// Response status plus the body parsed as JSON (`Null` for non-JSON bodies)
pub struct TestResponse {
    pub status: StatusCode,
    pub json: serde_json::Value,
    pub text: String,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&bytes).to_string();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

    TestResponse { status, json, text }
}

/// `POST /export/playlists/{playlist_id}` with a raw body
pub fn export_request(playlist_id: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/export/playlists/{}", playlist_id))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Export body with the given target email
pub fn export_body(target_email: &str) -> String {
    serde_json::json!({ "targetEmail": target_email }).to_string()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
