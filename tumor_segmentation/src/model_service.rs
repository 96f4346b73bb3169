use crate::{decoded_image::DecodedImage, errors::Result, prediction::Prediction};

/// The opaque segmentation collaborator: given an image, returns detected regions.
pub trait SegmentationModel: Send + Sync + 'static {
    fn predict(&self, image: &DecodedImage) -> Result<Prediction>;
}
