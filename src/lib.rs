pub mod accounts;
mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod scoring;
pub mod state;
pub mod store;
pub mod types;
mod uploads;

pub use app::app;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

/// Loads the data directory and serves the API until Ctrl+C or SIGTERM.
pub async fn serve(config: config::AppConfig) -> std::io::Result<()> {
    let db = match config.data_dir.as_deref() {
        Some(dir) => store::Database::open(dir)
            .await
            .map_err(std::io::Error::other)?,
        None => store::Database::in_memory(),
    };
    let db = Arc::new(db);
    let addr = config.bind;
    let router = app(config, Arc::clone(&db));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    if let Ok(db) = Arc::try_unwrap(db) {
        db.close().await.map_err(std::io::Error::other)?;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
        tracing::info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!("failed to install terminate handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
