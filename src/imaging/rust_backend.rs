//! Image processing backend built on the `image` crate, with `webp` for
//! lossy WebP.
//!
//! Everything is statically linked into the binary; no system image
//! libraries are needed at runtime.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only, no full decode) |
//! | Decode (JPEG, PNG, TIFF, WebP, BMP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless) |
//! | Encode → WebP | `webp::Encoder` (lossy, quality) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Formats are sniffed from file contents rather than trusted from the
//! extension, so a PNG saved as `.jpg` still decodes.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::ResizeParams;
use crate::config::OutputFormat;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<File>>, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    open_reader(path)?.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })
}

fn create(path: &Path) -> Result<BufWriter<File>, BackendError> {
    File::create(path).map(BufWriter::new).map_err(BackendError::Io)
}

/// Save a DynamicImage in the requested format.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), BackendError> {
    let quality = quality.clamp(1, 100) as u8;

    let result = match format {
        // JPEG has no alpha channel
        OutputFormat::Jpg => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(
            image::codecs::jpeg::JpegEncoder::new_with_quality(create(path)?, quality),
        ),
        OutputFormat::Png => {
            img.write_with_encoder(image::codecs::png::PngEncoder::new(create(path)?))
        }
        OutputFormat::Webp => return save_lossy_webp(img, path, quality),
        OutputFormat::Avif => eight_bit(img).write_with_encoder(
            image::codecs::avif::AvifEncoder::new_with_speed_quality(create(path)?, 6, quality),
        ),
    };

    result.map_err(|e| {
        BackendError::ProcessingFailed(format!(
            "{} encode failed: {}",
            format.extension().to_uppercase(),
            e
        ))
    })
}

/// The `image` crate only writes lossless WebP, which is usually bigger than
/// the JPEG it came from. libwebp takes a quality.
fn save_lossy_webp(img: &DynamicImage, path: &Path, quality: u8) -> Result<(), BackendError> {
    let img = eight_bit(img);
    let encoder = webp::Encoder::from_image(&img)
        .map_err(|e| BackendError::ProcessingFailed(format!("WEBP encode failed: {e}")))?;
    let encoded = encoder.encode(f32::from(quality));
    std::fs::write(path, &*encoded).map_err(BackendError::Io)
}

/// WebP and AVIF encoders only accept 8-bit RGB(A).
fn eight_bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_reader(path)?.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let img = if (img.width(), img.height()) == (params.width, params.height) {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        save_image(&img, &params.output, params.format, params.quality.value())
    }
}
