//! HTTP route handlers

pub mod health;
pub mod submit;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

pub use health::{health_check, version_info};
pub use submit::handle_submit;

/// Build a JSON response with CORS headers
pub(crate) fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Minimal chat UI entry point. Deployments front this with their own
/// static wizard; the gateway only owns the POST contract.
pub fn chat_page() -> Response<Full<Bytes>> {
    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Deep Dive</title>
</head>
<body>
  <p>Deep-dive intake gateway. The survey wizard posts JSON to <code>/submit</code>.</p>
</body>
</html>
"#;

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(PAGE)))
        .unwrap()
}
