//! HTTP routes

pub mod dashboard;
pub mod databases;
pub mod health;
pub mod metrics;
pub mod performance;

use askama::Template;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::AppError;
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState, static_dir: &str) -> Router {
    Router::new()
        // Pages
        .route("/", get(dashboard::dashboard_page))
        .route("/health", get(health::health_page))
        .route("/databases", get(databases::databases_page))
        // JSON
        .route("/api/dashboard", get(dashboard::dashboard_json))
        .route("/api/health", get(health::health_json))
        .route("/api/databases", get(databases::databases_json))
        .route("/api/performance", get(performance::performance))
        // Probes and metrics
        .route("/api/status", get(health::status))
        .route("/api/healthz", get(health::healthz))
        .route("/api/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                )),
        )
}

async fn count_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.metrics.inc_requests();
    next.run(request).await
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

/// Render a page template with the given status. A template failure becomes
/// a plain 500 JSON error.
pub(crate) fn render_page<T: Template>(status: StatusCode, page: T) -> Response {
    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render page");
            AppError::from(e).into_response()
        }
    }
}
