//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the transform
//! pipeline needs: identify (read dimensions) and resize (decode, scale,
//! encode, write).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), which needs no system
//! libraries. Everything is statically linked into the binary.

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared by every rayon worker.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the source, scale it to the requested size if it differs, and
    /// write it to the output path in the requested format.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
