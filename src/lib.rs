//! Campus news backend: article CRUD, account registration with email
//! verification, per-user article ratings and collaborative-filtering
//! recommendations, served over a JSON REST API.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use http::build_router;
pub use state::AppState;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// Open the database, bind the listener and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    let address = config.bind_address.clone();
    let state = AppState::new(config).await?;
    let app = build_router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
