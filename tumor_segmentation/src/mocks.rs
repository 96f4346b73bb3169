use crate::{
    decoded_image::DecodedImage,
    errors::{Result, SegmentationError},
    model_service::SegmentationModel,
    prediction::{BoundingBox, BoxMask, Detection, Prediction},
};
use image::{GrayImage, Luma};

/// Test double that finds one region covering the middle half of any image.
#[derive(Debug, Clone)]
pub struct MockSegmentationModel {
    pub confidence: f32,
}

impl MockSegmentationModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for MockSegmentationModel {
    fn default() -> Self {
        Self { confidence: 0.9 }
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn predict(&self, image: &DecodedImage) -> Result<Prediction> {
        let (width, height) = image.dimensions();
        let bbox = BoundingBox {
            x1: width as f32 / 4.,
            y1: height as f32 / 4.,
            x2: width as f32 * 3. / 4.,
            y2: height as f32 * 3. / 4.,
        };
        let (left, top, region_w, region_h) = BoxMask::region(&bbox, width, height);
        let mask = BoxMask {
            left,
            top,
            pixels: GrayImage::from_fn(region_w, region_h, |dx, dy| {
                let (x, y) = ((left + dx) as f32 + 0.5, (top + dy) as f32 + 0.5);
                if bbox.contains(x, y) {
                    Luma([255])
                } else {
                    Luma([0])
                }
            }),
        };

        Ok(Prediction {
            width,
            height,
            detections: vec![Detection {
                class_id: 0,
                confidence: self.confidence,
                bbox,
                mask: Some(mask),
            }],
        })
    }
}

/// Test double whose every invocation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSegmentationModel;

impl SegmentationModel for FailingSegmentationModel {
    fn predict(&self, _image: &DecodedImage) -> Result<Prediction> {
        Err(SegmentationError::Inference(
            "mock model failure".to_string(),
        ))
    }
}
