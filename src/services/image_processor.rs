// src/services/image_processor.rs
use crate::errors::LeafError;
use crate::models::{DecodedImage, INPUT_SIZE};
use image::GenericImageView;
use image::imageops::FilterType;
use image::io::{Limits, Reader};
use std::io::Cursor;

const MAX_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, Copy)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Decodes an uploaded image and resizes it to the classifier's input grid.
    /// CPU-bound; callers on the async executor should run it via `web::block`.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage, LeafError> {
        if data.is_empty() {
            return Err(LeafError::Decode("uploaded file is empty".to_string()));
        }

        let mut reader = Reader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| LeafError::Decode(format!("Failed to read image: {}", e)))?;

        // Checked against the header before any pixel buffer is allocated.
        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_DIMENSION);
        limits.max_image_height = Some(MAX_DIMENSION);
        reader.limits(limits);

        let img = reader.decode().map_err(|e| match e {
            image::ImageError::Limits(_) => LeafError::Decode(format!(
                "Image dimensions exceed {}x{}",
                MAX_DIMENSION, MAX_DIMENSION
            )),
            other => LeafError::Decode(format!("Invalid image format: {}", other)),
        })?;

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(LeafError::Decode("image has no pixels".to_string()));
        }

        // Same bilinear squash the ViT processor applies; aspect ratio is not kept.
        let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

        DecodedImage::new(resized.to_rgb8())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    pub(crate) fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut output = Vec::new();
        img.write_to(&mut Cursor::new(&mut output), format).unwrap();
        output
    }

    pub(crate) fn leaf_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, 160, (y % 256) as u8])
        });
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    #[test]
    fn decodes_png_to_input_grid() {
        let decoded = ImageProcessor::new().decode(&leaf_png(640, 480)).unwrap();
        assert_eq!(decoded.pixels().dimensions(), (INPUT_SIZE, INPUT_SIZE));
    }

    #[test]
    fn decodes_jpeg_and_drops_alpha() {
        let jpeg = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 80, Rgb([20, 120, 40]))),
            ImageFormat::Jpeg,
        );
        assert!(ImageProcessor::new().decode(&jpeg).is_ok());

        let rgba = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([10, 200, 30, 255]))),
            ImageFormat::Png,
        );
        let decoded = ImageProcessor::new().decode(&rgba).unwrap();
        assert_eq!(decoded.pixels().get_pixel(100, 100), &Rgb([10, 200, 30]));
    }

    #[test]
    fn empty_payload_is_a_decode_error() {
        let err = ImageProcessor::new().decode(&[]).unwrap_err();
        assert!(matches!(err, LeafError::Decode(_)));
    }

    #[test]
    fn garbage_and_truncated_payloads_are_decode_errors() {
        let processor = ImageProcessor::new();
        assert!(matches!(
            processor.decode(b"definitely not an image"),
            Err(LeafError::Decode(_))
        ));

        let png = leaf_png(64, 64);
        assert!(matches!(
            processor.decode(&png[..png.len() / 4]),
            Err(LeafError::Decode(_))
        ));
    }

    #[test]
    fn oversized_dimensions_are_rejected_from_the_header() {
        let processor = ImageProcessor::new();

        let wide = leaf_png(MAX_DIMENSION + 1, 1);
        let err = processor.decode(&wide).unwrap_err();
        assert!(matches!(err, LeafError::Decode(_)));
        assert!(err.to_string().contains("exceed"), "{}", err);

        let tall = leaf_png(1, MAX_DIMENSION + 1);
        assert!(matches!(processor.decode(&tall), Err(LeafError::Decode(_))));

        assert!(processor.decode(&leaf_png(MAX_DIMENSION, 1)).is_ok());
    }

    #[test]
    fn decoding_is_deterministic() {
        let png = leaf_png(300, 200);
        let processor = ImageProcessor::new();
        let a = processor.decode(&png).unwrap();
        let b = processor.decode(&png).unwrap();
        assert_eq!(a.pixels(), b.pixels());
    }
}
