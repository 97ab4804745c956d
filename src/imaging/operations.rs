//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{SizeBounds, calculate_bounded_dimensions};
use super::params::{Quality, ResizeParams};
use crate::config::{MirrorConfig, OutputFormat};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Configuration for bounded re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeConfig {
    pub bounds: SizeBounds,
    pub quality: Quality,
    pub format: OutputFormat,
}

impl EncodeConfig {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            bounds: SizeBounds {
                max_long: config.max_long_size,
                max_short: config.max_short_size,
            },
            quality: Quality::new(config.quality),
            format: config.output_format,
        }
    }
}

/// Outcome of a bounded encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedImage {
    pub original: (u32, u32),
    pub output: (u32, u32),
}

impl EncodedImage {
    pub fn resized(&self) -> bool {
        self.original != self.output
    }
}

/// Plan a bounded encode without executing it.
///
/// Useful for testing parameter generation.
pub fn plan_encode(
    source: &Path,
    output: &Path,
    original: (u32, u32),
    config: &EncodeConfig,
) -> ResizeParams {
    let (width, height) = calculate_bounded_dimensions(original, config.bounds).unwrap_or(original);

    ResizeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        height,
        quality: config.quality,
        format: config.format,
    }
}

/// Identify the source, shrink it into the configured bounds if needed, and
/// encode it to `output`.
pub fn encode_bounded(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    config: &EncodeConfig,
) -> Result<EncodedImage> {
    let original = get_dimensions(backend, source)?;
    let params = plan_encode(source, output, original, config);
    backend.resize(&params)?;

    Ok(EncodedImage {
        original,
        output: (params.width, params.height),
    })
}
