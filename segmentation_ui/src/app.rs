use crate::{branding::Branding, server::HttpServer};
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tumor_segmentation::{config::Config, InferenceService};

/// Serves the UI until SIGINT or SIGTERM.
///
/// Unlike the API, a model that cannot be loaded does not stop the UI: pages
/// carry the initialization error and predictions report it.
pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let branding = Branding::load(&config.ui.logo_path);

    let inference_service = InferenceService::initialize(&config).map_err(|e| {
        tracing::error!("Failed to initialize inference service: {}", e);
        Arc::<str>::from(e.to_string())
    });

    let server = HttpServer::new(inference_service, branding, &config.ui).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
