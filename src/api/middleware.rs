//! Request Logging
//!
//! Tags every request with a UUID and logs it on the way in and out.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Log method and path on entry, status and elapsed time on exit
pub async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    tracing::info!(request_id = %request_id, %method, %path, "Request");

    let response = next.run(request).await;

    tracing::info!(
        request_id = %request_id,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "Response"
    );
    response
}
