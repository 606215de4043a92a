//! HTTP serving layer.
//!
//! Thin axum surface over the orchestrator and history store:
//!
//! - `POST /profile` — synchronous flow
//! - `GET /stream-profile` — streaming flow over SSE
//! - `GET /history` / `DELETE /history` — run history
//! - `GET /versions` — resolvable runtime versions

mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tracing::info;

use crate::config::ServiceConfig;
use crate::pipeline::Orchestrator;
use crate::storage::HistoryStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// History store, injected at startup.
    pub store: Arc<dyn HistoryStore>,
    /// Allowed cross-origin value; empty disables the CORS headers.
    pub frontend_origin: String,
}

/// Builds the application router.
pub fn build_router(orchestrator: Arc<Orchestrator>, store: Arc<dyn HistoryStore>) -> Router {
    let state = AppState {
        frontend_origin: orchestrator.config().frontend_origin.clone(),
        orchestrator,
        store,
    };

    Router::new()
        .route("/profile", axum::routing::post(routes::profile))
        .route("/stream-profile", get(routes::stream_profile))
        .route(
            "/history",
            get(routes::history).delete(routes::clear_history),
        )
        .route("/versions", get(routes::versions))
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

/// Runs the HTTP server until shutdown.
pub async fn serve(config: ServiceConfig, store: Arc<dyn HistoryStore>) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr.clone();
    let orchestrator = Arc::new(Orchestrator::new(config, store.clone()));
    let app = build_router(orchestrator, store);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(addr = %bind_addr, "Gateway listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Single-origin CORS middleware; answers preflight with 204.
async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;

    let mut response = if is_preflight {
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(axum::body::Body::empty())
            .unwrap_or_default()
    } else {
        next.run(request).await
    };

    if !state.frontend_origin.is_empty() {
        let headers = response.headers_mut();
        if let Ok(origin) = state.frontend_origin.parse() {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, GET, OPTIONS, PUT, DELETE"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(
                "Accept, Content-Type, Content-Length, Accept-Encoding, Authorization",
            ),
        );
    }

    response
}
