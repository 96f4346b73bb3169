use super::{page_response, UiError};
use crate::{page::PageState, server::UiState};
use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::Response,
    Form,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use tracing::instrument;
use tumor_segmentation::{DecodedImage, SegmentationModel};

#[derive(Deserialize, Debug)]
pub struct PredictForm {
    /// Base64 PNG of the uploaded image.
    pub image: String,
}

#[instrument(skip(state, form))]
pub async fn predict<M: SegmentationModel>(
    State(state): State<UiState<M>>,
    form: Result<Form<PredictForm>, FormRejection>,
) -> Response {
    let original = match form {
        Ok(Form(form)) => form.image,
        Err(rejection) => {
            let err = UiError::Payload(rejection.body_text());
            tracing::warn!("Prediction request failed: {}", err);
            let page = PageState::PredictionFailed {
                original: None,
                message: err.to_string(),
            };
            return page_response(&state, &page, StatusCode::BAD_REQUEST);
        }
    };

    match segment_payload(&state, &original).await {
        Ok(segmented) => {
            let page = PageState::PredictionDisplayed {
                original,
                segmented,
            };
            page_response(&state, &page, StatusCode::OK)
        }
        Err(err) => {
            tracing::error!("Segmentation failed: {}", err);
            let page = PageState::PredictionFailed {
                original: Some(original),
                message: err.to_string(),
            };
            page_response(&state, &page, StatusCode::BAD_REQUEST)
        }
    }
}

async fn segment_payload<M: SegmentationModel>(
    state: &UiState<M>,
    original: &str,
) -> Result<String, UiError> {
    let inference_service = state
        .inference_service
        .as_ref()
        .map_err(|e| UiError::ModelUnavailable(e.to_string()))?;

    let bytes = STANDARD
        .decode(original.trim())
        .map_err(|e| UiError::Payload(e.to_string()))?;
    let image = DecodedImage::decode(&bytes)?;

    let segmented = inference_service.segment(image).await?;
    Ok(STANDARD.encode(segmented.encode_png()?))
}
