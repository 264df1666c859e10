//! Decoding of base64 image payloads into normalized RGB bitmaps

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

use crate::config::LimitsConfig;
use crate::imaging::base64;

/// Client-facing decode failures
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid base64 encoding: {0}")]
    InvalidEncoding(#[from] ::base64::DecodeError),

    #[error("Image is too large (max {}MB)", .limit / (1024 * 1024))]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid image format: {0}")]
    InvalidImageFormat(#[from] image::ImageError),
}

/// Turns transport payloads into bitmaps that are safe to hand to the model
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_payload_bytes: usize,
    max_dimension: u32,
}

impl ImageDecoder {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_payload_bytes: limits.max_payload_bytes,
            max_dimension: limits.max_dimension,
        }
    }

    /// Error reported for payloads over the size limit
    pub fn too_large(&self, size: usize) -> DecodeError {
        DecodeError::PayloadTooLarge {
            size,
            limit: self.max_payload_bytes,
        }
    }

    /// Decode a base64 payload into an RGB bitmap no larger than the
    /// configured maximum dimension on either axis.
    ///
    /// Alpha and palette information is dropped by the RGB conversion.
    pub fn decode(&self, payload: &str) -> Result<RgbImage, DecodeError> {
        if let Some(format) = base64::get_format_from_data_url(payload) {
            debug!(declared_format = %format, "Payload carries a data URL prefix");
        }

        let bytes = base64::decode(payload)?;
        if bytes.len() > self.max_payload_bytes {
            return Err(self.too_large(bytes.len()));
        }

        let image = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?
            .decode()?;

        Ok(self.normalize(image))
    }

    /// Downscale oversized images and convert to RGB
    pub fn normalize(&self, image: DynamicImage) -> RgbImage {
        let (width, height) = image.dimensions();

        let image = if width > self.max_dimension || height > self.max_dimension {
            let resized = image.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3);
            debug!(
                from_width = width,
                from_height = height,
                to_width = resized.width(),
                to_height = resized.height(),
                "Downscaled oversized image"
            );
            resized
        } else {
            image
        };

        match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        }
    }
}
