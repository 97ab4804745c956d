//! # photo-slim
//!
//! Keeps a slim mirror of a photo library: every image resized and
//! re-encoded, every video or raw file copied as is, and the directory tree
//! flattened to a bounded depth so the copy fits devices and viewers that
//! choke on deep hierarchies.
//!
//! # Operations
//!
//! ```text
//! mirror   source/  →  dest/    classify, transform (parallel), copy
//! sync     dest/ − source/      delete destination files no source maps to
//! repair   repair_time_dir/     reset mtimes that drifted from EXIF capture time
//! ```
//!
//! Each operation scans first, reports what it would do, and only touches the
//! filesystem after confirmation. See [`run`] for the lifecycle.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `photo-slim.toml` (or legacy JSON) loading, defaults, validation |
//! | [`rules`] | Compiled black list, white list, and extension patterns |
//! | [`mapping`] | Bounded-depth path flattening and the desired-path registry |
//! | [`classify`] | Walks the source tree into transform, copy, excluded, unmatched |
//! | [`process`] | Transform stage (bounded resize + re-encode) and copy stage |
//! | [`sync`] | Orphan detection and deletion |
//! | [`repair`] | Drift detection between mtime and capture time, and correction |
//! | [`metadata`] | Capture timestamp extraction from EXIF |
//! | [`imaging`] | Image operations: identify, bounded resize, encode |
//! | [`run`] | Scan → confirm → execute lifecycle for each operation |
//! | [`events`] | Progress events sent from the library to the CLI |
//! | [`output`] | CLI output formatting, pure functions over events and summaries |
//!
//! # Design Decisions
//!
//! ## Flatten, Don't Truncate
//!
//! Directories past `max_depth` are folded into the file name
//! (`a/b/c/d.jpg` → `a/b-c-d.jpg` at depth 1) rather than dropped, so the
//! flattened name still says where the picture came from. Folding can make
//! two sources collide; collisions are reported, and `flatten_hash_suffix`
//! makes folded names unique.
//!
//! ## Timestamps Carry the Date
//!
//! Re-encoding discards EXIF, so every written file gets its source's
//! modification time. Viewers that sort by date still show the library in
//! order. `repair` exists for sources whose own mtime has been lost.
//!
//! ## Self-Contained Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, JPEG,
//! PNG, and AVIF encoders) and the `webp` crate for lossy WebP, which builds
//! libwebp from source. No ImageMagick and no system libraries, so the
//! binary runs anywhere it is copied.

pub mod classify;
pub mod config;
pub mod events;
pub mod imaging;
pub mod mapping;
pub mod metadata;
pub mod output;
pub mod process;
pub mod repair;
pub mod rules;
pub mod run;
pub mod sync;
mod workers;

#[cfg(test)]
pub(crate) mod test_helpers;
