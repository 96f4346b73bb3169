mod decoded_image;
mod errors;
mod inference_service;
mod labels;
mod model_service;
mod ort_service;
mod overlay;
mod postprocess;
mod prediction;
mod preprocess;

pub mod config;
pub mod mocks;

pub use decoded_image::DecodedImage;
pub use errors::{Result, SegmentationError};
pub use inference_service::InferenceService;
pub use labels::{load_labels, ClassLabel, ClassLabels};
pub use model_service::SegmentationModel;
pub use ort_service::OrtSegmentationModel;
pub use overlay::{render_overlay, OverlayStyle};
pub use postprocess::{decode_segmentation, PostprocessSettings};
pub use prediction::{BoundingBox, BoxMask, Detection, Prediction};
pub use preprocess::image_to_tensor;
