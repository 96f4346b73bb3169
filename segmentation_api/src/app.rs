use crate::server::HttpServer;
use tokio::{signal, sync::broadcast};
use tumor_segmentation::{config::Config, InferenceService};

/// Loads the model, then serves the API until SIGINT or SIGTERM.
///
/// A model that cannot be loaded aborts startup before the listener is bound.
pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let inference_service = match InferenceService::initialize(&config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to initialize inference service: {}", e);
            return Err(e.into());
        }
    };

    let server = HttpServer::new(inference_service, &config.api).await?;

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
