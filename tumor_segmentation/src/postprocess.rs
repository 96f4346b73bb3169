use crate::{
    config::ModelConfig,
    errors::{Result, SegmentationError},
    prediction::{BoundingBox, BoxMask, Detection, Prediction},
};
use image::{GrayImage, Luma};
use ndarray::{s, ArrayView1, ArrayView3, ArrayViewD, Axis, Ix2, Ix3};

#[derive(Debug, Clone, Copy)]
pub struct PostprocessSettings {
    pub input_size: u32,
    pub min_probability: f32,
    pub iou_threshold: f32,
    pub mask_threshold: f32,
    pub max_detections: usize,
}

impl From<&ModelConfig> for PostprocessSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            input_size: config.input_size,
            min_probability: config.min_probability,
            iou_threshold: config.iou_threshold,
            mask_threshold: config.mask_threshold,
            max_detections: config.max_detections,
        }
    }
}

struct Candidate {
    class_id: usize,
    confidence: f32,
    bbox: BoundingBox,
    anchor: usize,
}

/// Decodes a YOLO-seg head into detections on an image of `width` x `height`.
///
/// `output` is `[1, 4 + classes + coefficients, anchors]`, `prototypes` is
/// `[1, coefficients, mask_h, mask_w]`.
pub fn decode_segmentation(
    output: ArrayViewD<f32>,
    prototypes: ArrayViewD<f32>,
    width: u32,
    height: u32,
    settings: &PostprocessSettings,
) -> Result<Prediction> {
    if output.ndim() != 3 || output.shape()[0] != 1 {
        return Err(SegmentationError::Inference(format!(
            "unexpected detection output shape {:?}",
            output.shape()
        )));
    }
    if prototypes.ndim() != 4 || prototypes.shape()[0] != 1 {
        return Err(SegmentationError::Inference(format!(
            "unexpected prototype output shape {:?}",
            prototypes.shape()
        )));
    }

    let output = output.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;
    let prototypes = prototypes
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix3>()?;

    let num_coefficients = prototypes.shape()[0];
    if prototypes.shape()[1] == 0 || prototypes.shape()[2] == 0 {
        return Err(SegmentationError::Inference(
            "mask prototypes are empty".to_string(),
        ));
    }
    let rows = output.shape()[0];
    if rows <= 4 + num_coefficients {
        return Err(SegmentationError::Inference(format!(
            "detection output has {} rows, expected more than {}",
            rows,
            4 + num_coefficients
        )));
    }
    let num_classes = rows - 4 - num_coefficients;

    let scale_x = width as f32 / settings.input_size as f32;
    let scale_y = height as f32 / settings.input_size as f32;

    let mut candidates = Vec::new();
    for (anchor, column) in output.axis_iter(Axis(1)).enumerate() {
        let best = column
            .slice(s![4..4 + num_classes])
            .iter()
            .copied()
            .enumerate()
            .reduce(|accum, item| if item.1 > accum.1 { item } else { accum });

        let Some((class_id, confidence)) = best else {
            continue;
        };
        if confidence < settings.min_probability {
            continue;
        }

        let xc = column[0] * scale_x;
        let yc = column[1] * scale_y;
        let w = column[2] * scale_x;
        let h = column[3] * scale_y;

        candidates.push(Candidate {
            class_id,
            confidence,
            bbox: BoundingBox {
                x1: (xc - w / 2.).clamp(0., width as f32),
                y1: (yc - h / 2.).clamp(0., height as f32),
                x2: (xc + w / 2.).clamp(0., width as f32),
                y2: (yc + h / 2.).clamp(0., height as f32),
            },
            anchor,
        });
    }

    let kept = non_max_suppression(candidates, settings.iou_threshold, settings.max_detections);
    if kept.is_empty() {
        return Ok(Prediction::empty(width, height));
    }

    let mut detections = Vec::with_capacity(kept.len());
    for candidate in kept {
        let coefficients = output.slice(s![4 + num_classes.., candidate.anchor]);
        let mask = box_mask(
            coefficients,
            &prototypes,
            width,
            height,
            &candidate.bbox,
            settings.mask_threshold,
        )?;

        detections.push(Detection {
            class_id: candidate.class_id,
            confidence: candidate.confidence,
            bbox: candidate.bbox,
            mask: Some(mask),
        });
    }

    Ok(Prediction {
        width,
        height,
        detections,
    })
}

/// Greedy per-class suppression, highest confidence first.
fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) >= iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

fn sigmoid(x: f32) -> f32 {
    1. / (1. + (-x).exp())
}

/// Builds the mask of one detection from the prototype cells under its box only.
///
/// Each image pixel centre in the box is mapped into prototype space and the
/// sigmoid probabilities are sampled bilinearly, so the cost follows the box
/// area rather than the image area.
fn box_mask(
    coefficients: ArrayView1<f32>,
    prototypes: &ArrayView3<f32>,
    width: u32,
    height: u32,
    bbox: &BoundingBox,
    threshold: f32,
) -> Result<BoxMask> {
    let (left, top, region_w, region_h) = BoxMask::region(bbox, width, height);
    if region_w == 0 || region_h == 0 {
        return Ok(BoxMask {
            left,
            top,
            pixels: GrayImage::new(0, 0),
        });
    }

    let (num_coefficients, mask_h, mask_w) = prototypes.dim();
    let scale_x = mask_w as f32 / width as f32;
    let scale_y = mask_h as f32 / height as f32;
    let (x0, x1) = prototype_window(left, region_w, scale_x, mask_w);
    let (y0, y1) = prototype_window(top, region_h, scale_y, mask_h);
    let (window_w, window_h) = (x1 - x0, y1 - y0);

    let cells = prototypes.slice(s![.., y0..y1, x0..x1]);
    let flat_cells = cells.to_shape((num_coefficients, window_h * window_w))?;
    let probabilities: Vec<f32> = coefficients
        .dot(&flat_cells)
        .iter()
        .map(|v| sigmoid(*v))
        .collect();

    let sample = |u: f32, v: f32| -> f32 {
        let u = (u - x0 as f32).clamp(0., (window_w - 1) as f32);
        let v = (v - y0 as f32).clamp(0., (window_h - 1) as f32);
        let (c0, r0) = (u.floor() as usize, v.floor() as usize);
        let (c1, r1) = ((c0 + 1).min(window_w - 1), (r0 + 1).min(window_h - 1));
        let (fx, fy) = (u - c0 as f32, v - r0 as f32);
        let at = |r: usize, c: usize| probabilities[r * window_w + c];
        let upper = at(r0, c0) * (1. - fx) + at(r0, c1) * fx;
        let lower = at(r1, c0) * (1. - fx) + at(r1, c1) * fx;
        upper * (1. - fy) + lower * fy
    };

    let pixels = GrayImage::from_fn(region_w, region_h, |dx, dy| {
        let cx = (left + dx) as f32 + 0.5;
        let cy = (top + dy) as f32 + 0.5;
        if bbox.contains(cx, cy) && sample(cx * scale_x - 0.5, cy * scale_y - 0.5) > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    Ok(BoxMask { left, top, pixels })
}

/// Half-open range of prototype cells needed to interpolate pixels `start..start + len`.
fn prototype_window(start: u32, len: u32, scale: f32, cells: usize) -> (usize, usize) {
    let first = ((start as f32 * scale - 0.5).floor().max(0.) as usize).min(cells - 1);
    let last = ((start + len) as f32 * scale - 0.5).ceil().max(0.) as usize + 1;
    (first, last.clamp(first + 1, cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    const INPUT: u32 = 64;

    fn settings() -> PostprocessSettings {
        PostprocessSettings {
            input_size: INPUT,
            min_probability: 0.25,
            iou_threshold: 0.7,
            mask_threshold: 0.5,
            max_detections: 300,
        }
    }

    /// Two classes, one coefficient, so every column is `[xc, yc, w, h, c0, c1, k]`.
    fn head(anchors: &[[f32; 7]]) -> Array3<f32> {
        let mut output = Array3::<f32>::zeros((1, 7, anchors.len()));
        for (j, anchor) in anchors.iter().enumerate() {
            for (i, value) in anchor.iter().enumerate() {
                output[[0, i, j]] = *value;
            }
        }
        output
    }

    fn prototypes(value: f32) -> Array4<f32> {
        Array4::<f32>::from_elem((1, 1, 16, 16), value)
    }

    fn run<D: ndarray::Dimension>(
        output: &ndarray::Array<f32, D>,
        protos: &Array4<f32>,
        width: u32,
        height: u32,
        settings: &PostprocessSettings,
    ) -> Result<Prediction> {
        decode_segmentation(
            output.view().into_dyn(),
            protos.view().into_dyn(),
            width,
            height,
            settings,
        )
    }

    #[test]
    fn test_low_confidence_is_dropped() {
        let output = head(&[[32., 32., 10., 10., 0.1, 0.2, 5.]]);
        let protos = prototypes(1.);

        let prediction = run(&output, &protos, 128, 128, &settings()).unwrap();

        assert!(prediction.detections.is_empty());
        assert_eq!((prediction.width, prediction.height), (128, 128));
    }

    #[test]
    fn test_boxes_are_scaled_to_original_image() {
        let output = head(&[[32., 16., 16., 8., 0.9, 0.1, 5.]]);
        let protos = prototypes(1.);

        let prediction = run(&output, &protos, 128, 256, &settings()).unwrap();

        assert_eq!(prediction.detections.len(), 1);
        let detection = &prediction.detections[0];
        assert_eq!(detection.class_id, 0);
        assert!((detection.confidence - 0.9).abs() < 1e-6);
        assert_eq!(
            detection.bbox,
            BoundingBox {
                x1: 48.,
                y1: 48.,
                x2: 80.,
                y2: 80.,
            }
        );
    }

    #[test]
    fn test_nms_is_per_class() {
        let output = head(&[
            [32., 32., 20., 20., 0.9, 0.0, 5.],
            [33., 32., 20., 20., 0.8, 0.0, 5.],
            [32., 32., 20., 20., 0.0, 0.7, 5.],
        ]);
        let protos = prototypes(1.);

        let prediction = run(&output, &protos, 64, 64, &settings()).unwrap();

        let mut found: Vec<(usize, f32)> = prediction
            .detections
            .iter()
            .map(|d| (d.class_id, d.confidence))
            .collect();
        found.sort_by(|a, b| b.1.total_cmp(&a.1));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, 0);
        assert!((found[0].1 - 0.9).abs() < 1e-6);
        assert_eq!(found[1].0, 1);
    }

    #[test]
    fn test_max_detections_caps_output() {
        let output = head(&[
            [8., 8., 4., 4., 0.9, 0.0, 5.],
            [32., 32., 4., 4., 0.8, 0.0, 5.],
            [56., 56., 4., 4., 0.7, 0.0, 5.],
        ]);
        let protos = prototypes(1.);
        let settings = PostprocessSettings {
            max_detections: 2,
            ..settings()
        };

        let prediction = run(&output, &protos, 64, 64, &settings).unwrap();

        assert_eq!(prediction.detections.len(), 2);
    }

    #[test]
    fn test_mask_is_cropped_to_box() {
        let output = head(&[[32., 32., 16., 16., 0.9, 0.0, 5.]]);
        let protos = prototypes(1.);

        let prediction = run(&output, &protos, 64, 64, &settings()).unwrap();

        let mask = prediction.detections[0].mask.as_ref().unwrap();
        assert_eq!((mask.left, mask.top), (24, 24));
        assert_eq!(mask.pixels.dimensions(), (16, 16));
        assert!(mask.is_set(32, 32));
        assert!(mask.is_set(24, 24));
        assert!(mask.is_set(39, 39));
        assert!(!mask.is_set(23, 32));
        assert!(!mask.is_set(40, 32));
        assert!(!mask.is_set(2, 2));
    }

    #[test]
    fn test_negative_logits_give_empty_mask() {
        let output = head(&[[32., 32., 16., 16., 0.9, 0.0, -5.]]);
        let protos = prototypes(1.);

        let prediction = run(&output, &protos, 64, 64, &settings()).unwrap();

        let mask = prediction.detections[0].mask.as_ref().unwrap();
        assert!(mask.pixels.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_masks_only_cover_their_boxes() {
        let mut anchors = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                let (xc, yc) = (3. + 6. * i as f32, 3. + 6. * j as f32);
                anchors.push([xc, yc, 0.04, 0.04, 0.9, 0.0, 5.]);
            }
        }
        let output = head(&anchors);
        let protos = prototypes(1.);

        let prediction = run(&output, &protos, 3000, 3000, &settings()).unwrap();

        assert_eq!(prediction.detections.len(), 100);
        let masks: Vec<&BoxMask> = prediction
            .detections
            .iter()
            .filter_map(|d| d.mask.as_ref())
            .collect();
        assert_eq!(masks.len(), 100);
        let mask_bytes: usize = masks.iter().map(|m| m.byte_len()).sum();
        assert!(mask_bytes <= 100 * 9, "masks hold {} bytes", mask_bytes);
        assert!(masks.iter().all(|m| m.pixels.pixels().any(|p| p[0] == 255)));
    }

    #[test]
    fn test_mask_follows_prototype_layout() {
        // Left half of the prototype grid is on, right half off.
        let mut protos = Array4::<f32>::from_elem((1, 1, 16, 16), -10.);
        protos.slice_mut(s![0, 0, .., ..8]).fill(10.);
        let output = head(&[[32., 32., 64., 64., 0.9, 0.0, 1.]]);

        let prediction = run(&output, &protos, 640, 640, &settings()).unwrap();

        let mask = prediction.detections[0].mask.as_ref().unwrap();
        assert_eq!(mask.pixels.dimensions(), (640, 640));
        assert!(mask.is_set(100, 300));
        assert!(!mask.is_set(540, 300));
    }

    #[test]
    fn test_shape_mismatch_is_an_inference_error() {
        let output = Array3::<f32>::zeros((1, 5, 10));
        let protos = prototypes(1.);

        let err = run(&output, &protos, 64, 64, &settings()).unwrap_err();
        assert!(matches!(err, SegmentationError::Inference(_)));

        let flat = ndarray::Array2::<f32>::zeros((7, 10));
        let err = run(&flat, &protos, 64, 64, &settings()).unwrap_err();
        assert!(matches!(err, SegmentationError::Inference(_)));
    }
}
