use crate::decoded_image::DecodedImage;
use image::imageops::{self, FilterType};
use ndarray::{Array, Ix4};

/// Resizes to `input_size` square and lays the pixels out as a `[1, 3, H, W]` tensor in `[0, 1]`.
///
/// Both front-ends go through this single path so a given upload yields the same prediction
/// whichever way it arrives.
pub fn image_to_tensor(image: &DecodedImage, input_size: u32) -> Array<f32, Ix4> {
    let side = input_size as usize;
    let resized = imageops::resize(
        image.as_rgb(),
        input_size,
        input_size,
        FilterType::CatmullRom,
    );

    let mut input = Array::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}
