//! Patient Service
//!
//! HTTP surface over [`dental_core`]: patients, appointments, consultations,
//! dental charts and treatment plans.
//!
//! # Modules
//!
//! - [`config`]: Environment configuration
//! - [`routes`]: Axum handlers, one module per resource
//! - [`upstream`]: Clinic directory and notification clients
//! - [`error`]: JSON error bodies and status mapping

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
pub mod upstream;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use state::AppState;

/// Full application: routes plus the CORS and tracing layers.
pub fn app(state: AppState) -> Router {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(addr: std::net::SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Starting patient service on {}", addr);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
