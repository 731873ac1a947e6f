use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::web::{handlers, AppState};

pub async fn start_web_server(state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let app = create_router(state.clone());
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/doublecheck", post(handlers::double_check))
        .route("/api/binlog/parse", post(handlers::parse_binlog))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
