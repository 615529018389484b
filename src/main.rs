use anyhow::Result;
use chat_relay::{create_app_router, state::AppState};
use shared::Config;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Carga las variables de entorno desde el archivo .env. Falla silenciosamente si no existe.
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.app.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(environment = %config.app.environment, "Starting chat relay...");
    match shared::resolver::base_target(&config.webhook, None) {
        Ok((url, _)) => info!(
            upstream = %shared::utils::redact_url(&url),
            api_key = config.webhook.api_key.is_some(),
            "Upstream webhook configured from environment"
        ),
        Err(_) => warn!("No upstream webhook in environment; relies on an override being set"),
    }

    let port = config.app.port;
    let app_state = AppState::new(config).await?;
    let app = create_app_router(Arc::new(app_state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
