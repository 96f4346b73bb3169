use crate::{
    config::Config,
    decoded_image::DecodedImage,
    errors::{Result, SegmentationError},
    labels::ClassLabels,
    model_service::SegmentationModel,
    ort_service::OrtSegmentationModel,
    overlay::{render_overlay, OverlayStyle},
};
use std::sync::Arc;
use tracing::instrument;

/// Application context owning the loaded model; built once at startup and shared by handlers.
pub struct InferenceService<M: SegmentationModel> {
    model_service: Arc<M>,
    class_labels: Arc<ClassLabels>,
    style: OverlayStyle,
}

impl<M: SegmentationModel> Clone for InferenceService<M> {
    fn clone(&self) -> Self {
        Self {
            model_service: self.model_service.clone(),
            class_labels: self.class_labels.clone(),
            style: self.style,
        }
    }
}

impl InferenceService<OrtSegmentationModel> {
    /// Loads the weights and class labels named by `config`.
    pub fn initialize(config: &Config) -> Result<Self> {
        let model_service = OrtSegmentationModel::new(&config.model)?;
        let class_labels = ClassLabels::load(&config.labels)?;
        tracing::info!(
            "Loaded {} class labels",
            class_labels.get_labels().len()
        );

        Ok(Self::new(
            model_service,
            class_labels,
            OverlayStyle::from(&config.model),
        ))
    }
}

impl<M: SegmentationModel> InferenceService<M> {
    pub fn new(model_service: M, class_labels: ClassLabels, style: OverlayStyle) -> Self {
        Self {
            model_service: Arc::new(model_service),
            class_labels: Arc::new(class_labels),
            style,
        }
    }

    /// Runs the model and returns `image` with the segmentation overlay drawn on it.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn segment_blocking(&self, image: &DecodedImage) -> Result<DecodedImage> {
        let prediction = self.model_service.predict(image)?;
        render_overlay(image, &prediction, &self.class_labels, &self.style)
    }

    /// Same as [`Self::segment_blocking`], on the blocking thread pool.
    pub async fn segment(&self, image: DecodedImage) -> Result<DecodedImage> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.segment_blocking(&image))
            .await
            .map_err(|e| SegmentationError::Inference(format!("inference task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{FailingSegmentationModel, MockSegmentationModel};
    use image::{Rgb, RgbImage};

    fn service() -> InferenceService<MockSegmentationModel> {
        InferenceService::new(
            MockSegmentationModel::new(),
            ClassLabels::default(),
            OverlayStyle::default(),
        )
    }

    #[tokio::test]
    async fn test_segment() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let image = DecodedImage::from_rgb(RgbImage::from_pixel(40, 20, Rgb([0, 0, 0])));

        let segmented = service().segment(image.clone()).await?;

        assert_eq!(segmented.dimensions(), (40, 20));
        assert_ne!(segmented, image);

        Ok(())
    }

    #[test]
    fn test_repeated_segment_keeps_dimensions() {
        let service = service();
        let image = DecodedImage::from_rgb(RgbImage::from_pixel(33, 17, Rgb([20, 40, 60])));

        let first = service.segment_blocking(&image).unwrap();
        let second = service.segment_blocking(&image).unwrap();

        assert_eq!(first.dimensions(), image.dimensions());
        assert_eq!(second.dimensions(), first.dimensions());
    }

    #[tokio::test]
    async fn test_model_failure_is_an_inference_error() {
        let service = InferenceService::new(
            FailingSegmentationModel,
            ClassLabels::default(),
            OverlayStyle::default(),
        );
        let image = DecodedImage::from_rgb(RgbImage::new(4, 4));

        let err = service.segment(image).await.unwrap_err();

        assert!(matches!(err, SegmentationError::Inference(_)));
        assert!(!err.is_fatal());
    }
}
