use super::page_response;
use crate::{page::PageState, server::UiState};
use axum::{extract::State, http::StatusCode, response::Response};
use tumor_segmentation::SegmentationModel;

pub async fn index<M: SegmentationModel>(State(state): State<UiState<M>>) -> Response {
    page_response(&state, &PageState::Idle, StatusCode::OK)
}
