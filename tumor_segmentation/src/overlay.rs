use crate::{
    config::ModelConfig,
    decoded_image::DecodedImage,
    errors::{Result, SegmentationError},
    labels::ClassLabels,
    prediction::{Detection, Prediction},
};
use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub mask_alpha: f32,
    pub box_thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            mask_alpha: 0.5,
            box_thickness: 2,
        }
    }
}

impl From<&ModelConfig> for OverlayStyle {
    fn from(config: &ModelConfig) -> Self {
        Self {
            mask_alpha: config.mask_alpha.clamp(0., 1.),
            box_thickness: config.box_thickness,
        }
    }
}

/// Draws every detection's mask and box over a copy of `image`.
pub fn render_overlay(
    image: &DecodedImage,
    prediction: &Prediction,
    labels: &ClassLabels,
    style: &OverlayStyle,
) -> Result<DecodedImage> {
    if image.dimensions() != (prediction.width, prediction.height) {
        return Err(SegmentationError::Inference(format!(
            "prediction is {}x{} but image is {}x{}",
            prediction.width,
            prediction.height,
            image.width(),
            image.height()
        )));
    }

    let mut canvas = image.as_rgb().clone();
    for detection in &prediction.detections {
        let color = labels.color(detection.class_id);
        blend_mask(&mut canvas, detection, color, style.mask_alpha)?;
        draw_box(&mut canvas, detection, color, style.box_thickness);
        tracing::debug!(
            "Rendered {} ({:.2}) at ({:.1}, {:.1}, {:.1}, {:.1})",
            labels.name(detection.class_id),
            detection.confidence,
            detection.bbox.x1,
            detection.bbox.y1,
            detection.bbox.x2,
            detection.bbox.y2
        );
    }

    Ok(DecodedImage::from_rgb(canvas))
}

fn blend_mask(
    canvas: &mut RgbImage,
    detection: &Detection,
    color: Rgb<u8>,
    alpha: f32,
) -> Result<()> {
    let Some(mask) = &detection.mask else {
        return Ok(());
    };
    if mask.right() > canvas.width() || mask.bottom() > canvas.height() {
        return Err(SegmentationError::Inference(format!(
            "mask spans ({}, {})..({}, {}) outside the {}x{} image",
            mask.left,
            mask.top,
            mask.right(),
            mask.bottom(),
            canvas.width(),
            canvas.height()
        )));
    }

    for (dx, dy, value) in mask.pixels.enumerate_pixels() {
        if value[0] == 0 {
            continue;
        }
        let pixel = canvas.get_pixel_mut(mask.left + dx, mask.top + dy);
        for (channel, tint) in pixel.0.iter_mut().zip(color.0) {
            let blended = (*channel as f32) * (1. - alpha) + (tint as f32) * alpha;
            *channel = blended.round().clamp(0., 255.) as u8;
        }
    }
    Ok(())
}

fn draw_box(canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>, thickness: u32) {
    let x = detection.bbox.x1.round() as i32;
    let y = detection.bbox.y1.round() as i32;
    let width = (detection.bbox.width().round() as u32).max(1);
    let height = (detection.bbox.height().round() as u32).max(1);

    for inset in 0..thickness {
        let inset = inset as i32;
        let w = width as i32 - 2 * inset;
        let h = height as i32 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}
