use crate::server::SharedState;
use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;
use tumor_segmentation::{DecodedImage, SegmentationError, SegmentationModel};

const ROUTE: &str = "/predict/";
const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Invalid upload: {0}")]
    Upload(String),
    #[error("No file found in upload, expected a `file` field")]
    MissingFile,
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error("HTTP builder failed: {0}")]
    HttpBuilder(String),
}

impl PredictError {
    fn kind(&self) -> &'static str {
        match self {
            PredictError::Upload(_) => "upload",
            PredictError::MissingFile => "missing_file",
            PredictError::Segmentation(e) => e.kind(),
            PredictError::HttpBuilder(_) => "http_builder",
        }
    }
}

impl From<MultipartRejection> for PredictError {
    fn from(err: MultipartRejection) -> Self {
        PredictError::Upload(err.body_text())
    }
}

impl From<MultipartError> for PredictError {
    fn from(err: MultipartError) -> Self {
        PredictError::Upload(err.body_text())
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorDetail {
    pub detail: String,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = match self {
            PredictError::HttpBuilder(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        let detail = ErrorDetail {
            detail: self.to_string(),
        };
        (status, Json(detail)).into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict<M: SegmentationModel>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, PredictError> {
    state.metrics.record_request(ROUTE);

    let result = segment_upload(&state, multipart).await;
    if let Err(err) = &result {
        tracing::warn!("Prediction request failed: {}", err);
        state.metrics.record_failure(err.kind(), ROUTE);
    }
    result
}

async fn segment_upload<M: SegmentationModel>(
    state: &SharedState<M>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, PredictError> {
    let upload = read_upload(multipart?).await?;
    let image = DecodedImage::decode(&upload)?;

    let started = Instant::now();
    let segmented = state.inference_service.segment(image).await;
    state
        .metrics
        .record_inference_duration(started.elapsed().as_millis() as u64, ROUTE);

    let png = segmented?.encode_png()?;

    Response::builder()
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(png))
        .map_err(|e| PredictError::HttpBuilder(e.to_string()))
}

/// Returns the `file` field, or failing that the first field that carries a file name.
async fn read_upload(mut multipart: Multipart) -> Result<Bytes, PredictError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?);
        }
        if fallback.is_none() && field.file_name().is_some() {
            fallback = Some(field.bytes().await?);
        }
    }

    fallback.ok_or(PredictError::MissingFile)
}
