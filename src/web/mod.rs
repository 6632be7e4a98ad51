// Web dashboard - axum router over the shared fallback ladder

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;

pub mod routes;
pub mod state;

pub use state::{AppState, DynDownloader, ResultStore};

/// Create the dashboard router
///
/// - `GET /` - dashboard page
/// - `GET /api/status` - output dir, tool availability and versions
/// - `POST /api/info`, `POST /api/formats` - metadata lookups
/// - `POST /api/download` - single video or audio into memory
/// - `GET /api/results/:id/files/:index` - export a stored file
/// - `POST /api/playlist`, `POST /api/batch` - runs into the output dir
/// - `GET /api/downloads` - files already in the output dir
/// - `GET|DELETE /api/history` - session history
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/api/status", get(routes::status))
        .route("/api/info", post(routes::info))
        .route("/api/formats", post(routes::formats))
        .route("/api/download", post(routes::download))
        .route("/api/results/:id/files/:index", get(routes::export_file))
        .route("/api/playlist", post(routes::playlist))
        .route("/api/batch", post(routes::batch))
        .route("/api/downloads", get(routes::downloads))
        .route(
            "/api/history",
            get(routes::get_history).delete(routes::clear_history),
        )
        .with_state(state)
}

/// Bind the configured address and serve until the process stops
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let bind_address = state.config.bind;
    tracing::info!(
        address = %bind_address,
        output_dir = %state.output_dir.display(),
        "[Web] starting dashboard"
    );

    let app = create_router(state);
    let listener = TcpListener::bind(bind_address).await?;
    tracing::info!(address = %bind_address, "[Web] dashboard listening");

    axum::serve(listener, app).await?;
    tracing::info!("[Web] dashboard stopped");
    Ok(())
}
