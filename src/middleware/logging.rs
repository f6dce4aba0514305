use axum::{
    body::{to_bytes, Body, Bytes, HttpBody},
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::time::Instant;

use crate::error::ApiError;

/// Body fields that must never reach the logs. Their length is logged instead.
const REDACTED_FIELDS: &[&str] = &["purchaseToken"];

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_CHARS: usize = 2000;

/// Middleware that logs requests and responses with a per-request id.
///
/// Only bodies whose size is known to fit in `MAX_BODY_BYTES` are buffered
/// for logging. Anything else is passed through untouched.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let (parts, body) = request.into_parts();

    let (body, logged) = match buffer_if_small(body).await {
        Ok(Buffered::Read(bytes)) => {
            let logged = redact_body(&bytes);
            (Body::from(bytes), logged)
        }
        Ok(Buffered::Skipped(body, reason)) => (body, reason),
        Err(e) => {
            // The handler sees an empty body and reports it as a bad argument
            tracing::error!(request_id = %request_id, "Failed to read request body: {}", e);
            (Body::empty(), "<unreadable>".to_string())
        }
    };

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        body = %logged,
        "→ Request"
    );

    let response = next.run(Request::from_parts(parts, body)).await;

    let status = response.status();
    let (parts, body) = response.into_parts();

    let (body, logged) = match buffer_if_small(body).await {
        Ok(Buffered::Read(bytes)) => {
            let logged = truncate_body(&String::from_utf8_lossy(&bytes), MAX_LOGGED_CHARS);
            (Body::from(bytes), logged)
        }
        Ok(Buffered::Skipped(body, reason)) => (body, reason),
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read response body: {}", e);
            return ApiError::Internal(anyhow::anyhow!("response body unreadable: {}", e))
                .into_response();
        }
    };

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        body = %logged,
        "← Response"
    );

    Response::from_parts(parts, body)
}

enum Buffered {
    Read(Bytes),
    Skipped(Body, String),
}

/// Buffer a body only when its size hint guarantees it fits the log limit
async fn buffer_if_small(body: Body) -> Result<Buffered, axum::Error> {
    match body.size_hint().upper() {
        Some(upper) if upper <= MAX_BODY_BYTES as u64 => {
            to_bytes(body, MAX_BODY_BYTES).await.map(Buffered::Read)
        }
        Some(upper) => Ok(Buffered::Skipped(body, format!("<{} bytes, not logged>", upper))),
        None => Ok(Buffered::Skipped(body, "<streamed, not logged>".to_string())),
    }
}

/// Render a JSON body for logging with secrets replaced by their length.
/// Non-JSON bodies are summarised by size only.
fn redact_body(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(mut map)) => {
            for field in REDACTED_FIELDS {
                if let Some(value) = map.get_mut(*field) {
                    let len = value.as_str().map(str::len).unwrap_or(0);
                    *value = Value::String(format!("<redacted, {} chars>", len));
                }
            }
            truncate_body(&Value::Object(map).to_string(), MAX_LOGGED_CHARS)
        }
        Ok(other) => truncate_body(&other.to_string(), MAX_LOGGED_CHARS),
        Err(_) => format!("<{} bytes, not JSON>", bytes.len()),
    }
}

/// Truncate body for logging, adding a marker if truncated
fn truncate_body(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}...[truncated, {} bytes total]",
            &body[..cut],
            body.len()
        ),
    }
}
