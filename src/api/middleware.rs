//! Request logging middleware

use axum::{
    extract::Request,
    http::header::ORIGIN,
    middleware::Next,
    response::Response,
};

use crate::system::metrics::{Metrics, Timer};

/// Log `method path origin` for every request and count it by status
pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();

    tracing::info!(%method, %path, %origin, "request");

    let metrics = Metrics::global();
    let timer = Timer::start(metrics.request_duration.clone());
    let response = next.run(request).await;
    timer.finish();

    let status = response.status();
    metrics
        .http_requests
        .with_label_values(&[method.as_str(), status.as_str()])
        .inc();

    if status.is_server_error() {
        tracing::error!(%method, %path, %origin, status = status.as_u16(), "request failed");
    } else {
        tracing::debug!(%method, %path, status = status.as_u16(), "response");
    }

    response
}
