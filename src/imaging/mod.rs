//! Image processing with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize → JPEG/PNG/AVIF** | Lanczos3 + `image` encoders |
//! | **Resize → WebP** | Lanczos3 + `webp` (lossy) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{SizeBounds, calculate_bounded_dimensions};
pub use operations::{EncodeConfig, EncodedImage, encode_bounded, get_dimensions, plan_encode};
pub use params::{Quality, ResizeParams};
pub use rust_backend::RustBackend;
