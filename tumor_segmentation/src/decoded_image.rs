use crate::errors::{Result, SegmentationError};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// An RGB bitmap, the unit passed to and returned from the inference service.
///
/// Whatever the source encoding, pixels are always normalized to 3 channels of `u8`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pixels: RgbImage,
}

impl DecodedImage {
    pub const CHANNELS: u8 = 3;

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image_reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| SegmentationError::Decode(e.to_string()))?;

        if image_reader.format().is_none() {
            return Err(SegmentationError::Decode(
                "unrecognized image format".to_string(),
            ));
        }

        let image = image_reader
            .decode()
            .map_err(|e| SegmentationError::Decode(e.to_string()))?;

        Ok(Self::from_dynamic(image))
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        let pixels = match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };
        Self { pixels }
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn channels(&self) -> u8 {
        Self::CHANNELS
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.pixels
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| SegmentationError::Encode(e.to_string()))?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, Rgba, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_png_rgba_is_normalized() {
        let rgba = RgbaImage::from_pixel(12, 7, Rgba([10, 20, 30, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let decoded = DecodedImage::decode(&bytes).unwrap();

        assert_eq!(decoded.dimensions(), (12, 7));
        assert_eq!(decoded.channels(), 3);
        assert_eq!(decoded.as_rgb().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_grayscale_jpeg() {
        let gray = GrayImage::from_pixel(32, 16, Luma([200]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Jpeg);

        let decoded = DecodedImage::decode(&bytes).unwrap();

        assert_eq!(decoded.dimensions(), (32, 16));
        assert_eq!(decoded.as_rgb().as_raw().len(), 32 * 16 * 3);
    }

    #[test]
    fn test_decode_rejects_non_image_bytes() {
        let err = DecodedImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, SegmentationError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let rgb = RgbImage::from_pixel(64, 64, Rgb([1, 2, 3]));
        let bytes = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Png);

        let err = DecodedImage::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, SegmentationError::Decode(_)));
    }

    #[test]
    fn test_encode_png_keeps_pixels() {
        let image = DecodedImage::from_rgb(RgbImage::from_pixel(5, 9, Rgb([255, 0, 0])));

        let png = image.encode_png().unwrap();
        assert_eq!(
            image::guess_format(&png).unwrap(),
            image::ImageFormat::Png
        );

        let round_trip = DecodedImage::decode(&png).unwrap();
        assert_eq!(round_trip, image);
    }
}
