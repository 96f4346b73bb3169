mod index;
mod logo;
mod predict;
mod upload;

use crate::{
    page::{render_page, PageContext, PageState},
    server::UiState,
};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tumor_segmentation::{SegmentationError, SegmentationModel};

#[derive(Error, Debug)]
pub enum UiError {
    #[error("Invalid upload: {0}")]
    Upload(String),
    #[error("No file selected")]
    MissingFile,
    #[error("Unsupported file type `{0}`, expected one of: {1}")]
    UnsupportedExtension(String, String),
    #[error("Invalid image payload: {0}")]
    Payload(String),
    #[error("Model is not available: {0}")]
    ModelUnavailable(String),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
}

pub fn ui_routes<M: SegmentationModel>() -> Router<UiState<M>> {
    Router::new()
        .route("/", get(index::index::<M>))
        .route("/upload", post(upload::upload::<M>))
        .route("/predict", post(predict::predict::<M>))
        .route("/logo.png", get(logo::logo::<M>))
}

/// Renders `page` with the shared branding and any initialization error.
pub(crate) fn page_response<M: SegmentationModel>(
    state: &UiState<M>,
    page: &PageState,
    status: StatusCode,
) -> Response {
    let ctx = PageContext {
        branding: &state.branding,
        allowed_extensions: &state.allowed_extensions,
        init_error: state.init_error(),
    };
    (status, Html(render_page(page, &ctx))).into_response()
}
