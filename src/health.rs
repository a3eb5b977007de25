//! Liveness endpoint — a fixed 200 on `/` for platform health checks.
//! Independent of the session engine; touches no session state.

use axum::routing::get;
use axum::Router;

pub fn router() -> Router {
    Router::new().route("/", get(|| async { "OK" }))
}

/// Bind and serve the liveness endpoint. Runs until the process exits.
pub async fn serve(port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "Liveness endpoint started");
    axum::serve(listener, router()).await
}
