use crate::{branding::Branding, routes::ui_routes};
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};
use tumor_segmentation::{config::UiConfig, InferenceService, SegmentationModel};

pub struct UiState<M: SegmentationModel> {
    /// The error message when the model could not be initialized.
    pub inference_service: Result<InferenceService<M>, Arc<str>>,
    pub branding: Arc<Branding>,
    pub allowed_extensions: Arc<[String]>,
}

impl<M: SegmentationModel> Clone for UiState<M> {
    fn clone(&self) -> Self {
        Self {
            inference_service: self.inference_service.clone(),
            branding: self.branding.clone(),
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }
}

impl<M: SegmentationModel> UiState<M> {
    pub fn init_error(&self) -> Option<&str> {
        self.inference_service.as_ref().err().map(|e| e.as_ref())
    }
}

pub fn build_router<M: SegmentationModel>(
    inference_service: Result<InferenceService<M>, Arc<str>>,
    branding: Branding,
    allowed_extensions: Vec<String>,
    max_upload_bytes: usize,
) -> Router {
    let app_state = UiState {
        inference_service,
        branding: Arc::new(branding),
        allowed_extensions: allowed_extensions.into(),
    };

    Router::new()
        .merge(ui_routes())
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: SegmentationModel>(
        inference_service: Result<InferenceService<M>, Arc<str>>,
        branding: Branding,
        config: &UiConfig,
    ) -> anyhow::Result<Self> {
        let addr = config.get_address();

        let router = build_router(
            inference_service,
            branding,
            config.allowed_extensions.clone(),
            config.max_upload_bytes,
        );

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting UI on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        });

        Ok(server_handle)
    }
}
