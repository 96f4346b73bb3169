use crate::server::UiState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tumor_segmentation::SegmentationModel;

pub async fn logo<M: SegmentationModel>(State(state): State<UiState<M>>) -> Response {
    match state.branding.logo() {
        Some((bytes, mime)) => ([(header::CONTENT_TYPE, mime)], bytes.to_vec()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
