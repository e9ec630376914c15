//! Web UI: an upload page plus a JSON endpoint that runs the pipeline.

mod handlers;
mod page;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use imagetale_core::Pipeline;

use handlers::AppState;

/// Multipart framing allowance on top of the image size limit.
const BODY_OVERHEAD: usize = 64 * 1024;

/// Build the application router.
pub fn router(pipeline: Pipeline, max_image_bytes: usize) -> Router {
    let state = Arc::new(AppState { pipeline });

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/api/story", post(handlers::create_story))
        .layer(DefaultBodyLimit::max(max_image_bytes + BODY_OVERHEAD))
        .with_state(state)
}

/// Serve `app` until ctrl-c.
pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down");
            }
        })
        .await
}
