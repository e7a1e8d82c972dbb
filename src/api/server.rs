//! HTTP server for the notes and users API

use axum::{
    handler::HandlerWithoutStateExt,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::{handlers, middleware::request_logger};
use crate::core::config::CorsConfig;
use crate::core::error::{Error, Result};
use crate::core::AppState;

/// Creates the main application router with all routes and middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);

    // Static files first, then the negotiated 404
    let static_files = ServeDir::new(&state.config.server.public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(handlers::not_found.into_service());

    let router = Router::new()
        // Root routes
        .route("/", get(handlers::root_handler))
        .route("/index", get(handlers::root_handler))
        .route("/index.html", get(handlers::root_handler))

        // Note routes
        .route(
            "/notes",
            get(handlers::list_notes)
                .post(handlers::create_note)
                .patch(handlers::update_note)
                .delete(handlers::delete_note)
                .fallback(handlers::not_found),
        )

        // User routes
        .route(
            "/users",
            get(handlers::list_users)
                .post(handlers::create_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user)
                .fallback(handlers::not_found),
        )

        // System routes
        .route("/health", get(handlers::health_check))

        .fallback_service(static_files);

    with_middleware(router, cors).with_state(state)
}

/// Wrap `router` in the request middleware stack.
///
/// The logger sits outside the panic catcher so a panicking handler is still
/// logged and counted as a 500.
fn with_middleware<S>(router: Router<S>, cors: CorsLayer) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(request_logger))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(cors),
    )
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::internal(format!("Handler panicked: {}", detail)).into_response()
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn start_server<F>(state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.server.http_addr;
    tracing::info!("Starting ticket notes API server on {}", addr);

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::internal(format!("HTTP server failed: {}", e)))
}

/// Serve the Prometheus text format on `/metrics` until `shutdown` resolves
pub async fn start_metrics_server<F>(addr: std::net::SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::internal(format!("Metrics server failed: {}", e)))
}

async fn metrics_handler() -> Result<String> {
    crate::system::metrics::gather()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::metrics::Metrics;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_handler_answers_json_500() {
        let app = with_middleware(Router::new().route("/explode", get(explode)), CorsLayer::new());
        let failures = || {
            Metrics::global()
                .http_requests
                .with_label_values(&["GET", "500"])
                .get()
        };
        let before = failures();

        let response = app
            .oneshot(Request::get("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Internal server error.");
        assert!(failures() > before);
    }
}
