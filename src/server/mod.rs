// src/server/mod.rs

//! HTTP surface: the streaming endpoint, the collected-result action and
//! the file-install action, served with axum.

pub mod error;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use crate::config::ServerSection;
use crate::exec::ProcessTable;

pub use error::{AppError, AppResult};
pub use state::AppState;

/// Build the full application [`Router`] with its middleware.
///
/// Shared by `serve` and the integration tests so both exercise the same
/// stack. No request timeout layer: streams stay open until their terminal
/// record.
pub fn build_router(state: AppState, server: &ServerSection) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/run", post(routes::run_stream))
        .route("/api/run/{id}", delete(routes::cancel_run))
        .route("/api/components/add", post(routes::add_component))
        .route("/api/components/files", post(routes::install_files))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(build_cors_layer(server))
        .with_state(state)
}

fn build_cors_layer(server: &ServerSection) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(routes::RUN_ID_HEADER)]);

    if server.cors_origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

/// Bind and serve until Ctrl-C. On shutdown every live run is cancelled so
/// open streams can finish with their terminal record.
pub async fn serve(state: AppState, server: &ServerSection) -> Result<()> {
    let table = state.relay.table().clone();
    let app = build_router(state, server);

    let addr = server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "bones server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(table))
        .await
        .context("serving HTTP")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal(table: ProcessTable) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }
    let cancelled = table.cancel_all();
    info!(cancelled, "shutdown requested; cancelling live runs");
}
