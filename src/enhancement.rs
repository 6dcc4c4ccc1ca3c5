//! # Image Enhancement Module
//!
//! Prepares photographed or scanned documents for text recognition. The
//! enhancement pass is a pure transform over raster bytes, applied in strict
//! order:
//!
//! 1. Grayscale with a three-way contrast threshold: bright pixels are pushed
//!    to white, dark pixels to black, mid-tones pass through unmodified.
//! 2. A fixed 3×3 sharpening convolution applied per channel.
//!
//! Both stages take a pixel buffer and return a new buffer, so they can be
//! unit tested without any rendering surface.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::debug;

use crate::errors::{PipelineError, PipelineResult};

/// Pixels with a channel average above this are pushed to white
pub const WHITE_CUTOFF: u8 = 128;
/// Pixels with a channel average below this are pushed to black
pub const BLACK_CUTOFF: u8 = 50;

/// Sharpening kernel; weights sum to 1, so flat regions are a fixed point
/// away from image borders.
const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

/// Validate raw input bytes before any heavy processing.
///
/// Rejects empty input, input above the configured size ceiling, and bytes
/// whose magic number does not look like a supported raster format.
pub fn validate_raster(bytes: &[u8], max_image_bytes: u64) -> PipelineResult<()> {
    if bytes.is_empty() {
        return Err(PipelineError::Decode("input image is empty".to_string()));
    }
    if bytes.len() as u64 > max_image_bytes {
        return Err(PipelineError::Decode(format!(
            "input image too large: {} bytes (maximum allowed: {} bytes)",
            bytes.len(),
            max_image_bytes
        )));
    }
    image::guess_format(bytes).map_err(|e| {
        PipelineError::Decode(format!("could not determine image format: {}", e))
    })?;
    Ok(())
}

/// Apply the grayscale pass with a three-way contrast threshold.
///
/// For each pixel the unweighted channel average `(R+G+B)/3` is computed and
/// all three color channels are set to 255 when the average is above
/// [`WHITE_CUTOFF`], 0 when it is below [`BLACK_CUTOFF`], and the average
/// itself otherwise. This is deliberately not a pure binarization: mid-tones
/// survive, which keeps anti-aliased glyph edges readable for the recognition
/// engine. The alpha channel is left untouched.
pub fn grayscale_threshold(image: &RgbaImage) -> RgbaImage {
    let mut output = RgbaImage::new(image.width(), image.height());

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let avg = ((r as u32 + g as u32 + b as u32) / 3) as u8;

        let value = if avg > WHITE_CUTOFF {
            255
        } else if avg < BLACK_CUTOFF {
            0
        } else {
            avg
        };

        output.put_pixel(x, y, Rgba([value, value, value, a]));
    }

    output
}

/// Apply the 3×3 sharpening convolution per RGB channel.
///
/// Neighbors outside the image bounds contribute zero: edge pixels receive a
/// partial-sum convolution rather than a reflected or extended border.
/// Accumulation happens in i32 and the result is clamped to [0, 255];
/// wraparound would inject black speckles into saturated regions, which is
/// the worst case for recognition accuracy. The output alpha is forced to 255.
pub fn sharpen(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let mut output = RgbaImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut acc = [0i32; 3];

            for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    if weight == 0 {
                        continue;
                    }
                    let sx = x as i64 + kx as i64 - 1;
                    let sy = y as i64 + ky as i64 - 1;
                    if sx < 0 || sy < 0 || sx >= width as i64 || sy >= height as i64 {
                        continue;
                    }
                    let source = image.get_pixel(sx as u32, sy as u32);
                    for (channel, sum) in acc.iter_mut().enumerate() {
                        *sum += weight * source.0[channel] as i32;
                    }
                }
            }

            output.put_pixel(
                x,
                y,
                Rgba([
                    acc[0].clamp(0, 255) as u8,
                    acc[1].clamp(0, 255) as u8,
                    acc[2].clamp(0, 255) as u8,
                    255,
                ]),
            );
        }
    }

    output
}

/// Enhance raster bytes for text recognition.
///
/// Decodes the input, applies [`grayscale_threshold`] then [`sharpen`], and
/// re-encodes the result as PNG in the same pixel dimensions. Deterministic
/// and free of side effects beyond reading the input.
///
/// # Errors
///
/// - [`PipelineError::Decode`] when the bytes cannot be decoded as an image
/// - [`PipelineError::Environment`] when the output buffer cannot be encoded
pub fn enhance(bytes: &[u8]) -> PipelineResult<Vec<u8>> {
    let start_time = std::time::Instant::now();

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::Decode(format!("failed to decode input image: {}", e)))?;
    let rgba = decoded.to_rgba8();

    let contrasted = grayscale_threshold(&rgba);
    let sharpened = sharpen(&contrasted);

    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(sharpened)
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|e| {
            PipelineError::Environment(format!("failed to encode enhanced image: {}", e))
        })?;

    debug!(
        target: "enhancement",
        "Image enhancement completed in {:.2}ms: dimensions={}x{}, input={} bytes",
        start_time.elapsed().as_millis(),
        rgba.width(),
        rgba.height(),
        bytes.len()
    );

    Ok(encoded.into_inner())
}
