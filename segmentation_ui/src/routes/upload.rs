use super::{page_response, UiError};
use crate::{page::PageState, server::UiState};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::instrument;
use tumor_segmentation::{DecodedImage, SegmentationModel};

const FILE_FIELD: &str = "file";

impl From<MultipartRejection> for UiError {
    fn from(err: MultipartRejection) -> Self {
        UiError::Upload(err.body_text())
    }
}

impl From<MultipartError> for UiError {
    fn from(err: MultipartError) -> Self {
        UiError::Upload(err.body_text())
    }
}

#[instrument(skip(state, multipart))]
pub async fn upload<M: SegmentationModel>(
    State(state): State<UiState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match accept_upload(&state.allowed_extensions, multipart).await {
        Ok(original) => {
            page_response(&state, &PageState::ImageUploaded { original }, StatusCode::OK)
        }
        Err(err) => {
            tracing::warn!("Upload rejected: {}", err);
            let page = PageState::UploadRejected {
                message: err.to_string(),
            };
            page_response(&state, &page, StatusCode::BAD_REQUEST)
        }
    }
}

/// Validates the uploaded file and returns it re-encoded as base64 PNG.
async fn accept_upload(
    allowed_extensions: &[String],
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, UiError> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(UiError::MissingFile);
        }
        check_extension(&file_name, allowed_extensions)?;

        let bytes = field.bytes().await?;
        let image = DecodedImage::decode(&bytes)?;
        tracing::info!(
            "Accepted upload {} ({}x{})",
            file_name,
            image.width(),
            image.height()
        );
        return Ok(STANDARD.encode(image.encode_png()?));
    }

    Err(UiError::MissingFile)
}

pub(crate) fn check_extension(
    file_name: &str,
    allowed_extensions: &[String],
) -> Result<(), UiError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        Ok(())
    } else {
        Err(UiError::UnsupportedExtension(
            extension,
            allowed_extensions.join(", "),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["jpg".to_string(), "png".to_string(), "jpeg".to_string()]
    }

    #[test]
    fn test_check_extension_is_case_insensitive() {
        assert!(check_extension("scan.PNG", &allowed()).is_ok());
        assert!(check_extension("brain.scan.Jpeg", &allowed()).is_ok());
    }

    #[test]
    fn test_check_extension_rejects_others() {
        assert!(matches!(
            check_extension("scan.bmp", &allowed()),
            Err(UiError::UnsupportedExtension(ext, _)) if ext == "bmp"
        ));
        assert!(check_extension("scan", &allowed()).is_err());
    }
}
