//! Unit tests for payload decoding and normalization

#[path = "../common/mod.rs"]
mod common;

use colorize_server::config::LimitsConfig;
use colorize_server::imaging::{base64, png, DecodeError, ImageDecoder};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};

fn decoder() -> ImageDecoder {
    ImageDecoder::new(&LimitsConfig::default())
}

#[test]
fn test_decode_png_keeps_pixels() {
    let original = common::gradient(120, 80);
    let payload = base64::encode(&png::encode(&original).unwrap());

    let bitmap = decoder().decode(&payload).unwrap();
    assert_eq!(bitmap.dimensions(), (120, 80));
    assert_eq!(bitmap.as_raw(), original.as_raw());
}

#[test]
fn test_decode_grayscale_jpeg_to_rgb() {
    let gray = GrayImage::from_pixel(64, 48, Luma([128]));
    let bytes = common::encode_image(&DynamicImage::ImageLuma8(gray), ImageFormat::Jpeg);

    let bitmap = decoder().decode(&base64::encode(&bytes)).unwrap();
    assert_eq!(bitmap.dimensions(), (64, 48));
    let [r, g, b] = bitmap.get_pixel(10, 10).0;
    assert_eq!(r, g);
    assert_eq!(g, b);
}

#[test]
fn test_decode_drops_alpha() {
    let rgba = RgbaImage::from_pixel(5, 5, Rgba([200, 100, 50, 10]));
    let bytes = common::encode_image(&DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

    let bitmap = decoder().decode(&base64::encode(&bytes)).unwrap();
    assert_eq!(bitmap.get_pixel(2, 2).0, [200, 100, 50]);
}

#[test]
fn test_decode_data_url() {
    let payload = format!("data:image/png;base64,{}", common::png_base64(10, 10));
    let bitmap = decoder().decode(&payload).unwrap();
    assert_eq!(bitmap.dimensions(), (10, 10));
}

#[test]
fn test_oversized_image_is_downscaled_preserving_aspect() {
    let decoder = ImageDecoder::new(&LimitsConfig {
        max_payload_bytes: 20 * 1024 * 1024,
        max_dimension: 4096,
    });
    let wide = common::encode_image(
        &DynamicImage::new_luma8(5000, 1250),
        ImageFormat::Png,
    );

    let bitmap = decoder.decode(&base64::encode(&wide)).unwrap();
    let (width, height) = bitmap.dimensions();
    assert_eq!(width, 4096);
    assert!(height <= 4096);

    let original_ratio = 5000.0 / 1250.0;
    let ratio = width as f64 / height as f64;
    assert!((ratio - original_ratio).abs() < 0.01, "ratio {} drifted", ratio);
}

#[test]
fn test_tall_image_is_downscaled() {
    let decoder = ImageDecoder::new(&LimitsConfig {
        max_payload_bytes: 1024 * 1024,
        max_dimension: 100,
    });
    let tall = common::encode_image(&DynamicImage::new_rgb8(60, 300), ImageFormat::Png);

    let bitmap = decoder.decode(&base64::encode(&tall)).unwrap();
    assert_eq!(bitmap.dimensions(), (20, 100));
}

#[test]
fn test_small_image_is_untouched() {
    let decoder = ImageDecoder::new(&LimitsConfig {
        max_payload_bytes: 1024 * 1024,
        max_dimension: 100,
    });
    let bitmap = decoder.decode(&common::png_base64(100, 40)).unwrap();
    assert_eq!(bitmap.dimensions(), (100, 40));
}

#[test]
fn test_decode_is_deterministic() {
    let decoder = ImageDecoder::new(&LimitsConfig {
        max_payload_bytes: 1024 * 1024,
        max_dimension: 50,
    });
    let payload = common::png_base64(200, 120);

    let first = decoder.decode(&payload).unwrap();
    let second = decoder.decode(&payload).unwrap();
    assert_eq!(first.as_raw(), second.as_raw());
}

#[test]
fn test_invalid_base64() {
    let err = decoder().decode("not-base64-!!").unwrap_err();
    assert!(matches!(err, DecodeError::InvalidEncoding(_)));
    assert!(err.to_string().starts_with("Invalid base64 encoding: "));
}

#[test]
fn test_non_image_bytes() {
    let err = decoder().decode(&base64::encode(b"hello world")).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidImageFormat(_)));
    assert!(err.to_string().starts_with("Invalid image format: "));
}

#[test]
fn test_truncated_png() {
    let mut bytes = png::encode(&common::gradient(50, 50)).unwrap();
    bytes.truncate(bytes.len() / 2);

    let err = decoder().decode(&base64::encode(&bytes)).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidImageFormat(_)));
}

#[test]
fn test_payload_over_limit_is_rejected() {
    let limit = 20 * 1024 * 1024;
    let payload = base64::encode(&vec![0u8; limit + 1]);

    let err = decoder().decode(&payload).unwrap_err();
    assert!(matches!(err, DecodeError::PayloadTooLarge { size, .. } if size == limit + 1));
    assert_eq!(err.to_string(), "Image is too large (max 20MB)");
}
