//! Shared test utilities for the photo-slim test suite.
//!
//! Builds throwaway source/destination trees and reads them back so tests
//! can assert on what a run left on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let source = tmp.path().join("source");
//! write_file(&source, "2019/Trip/a.jpg", b"jpeg bytes");
//! write_file(&source, "notes.txt", b"text");
//!
//! assert_eq!(tree_files(&source), vec!["2019/Trip/a.jpg", "notes.txt"]);
//! ```

use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

pub use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `bytes` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Write a file of `len` filler bytes.
pub fn write_sized(root: &Path, relative: &str, len: usize) -> PathBuf {
    write_file(root, relative, &vec![b'x'; len])
}

/// Write a small synthetic JPEG at `path`.
pub fn create_jpeg(path: &Path, width: u32, height: u32, quality: u8) {
    use image::{ImageEncoder, RgbImage};

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let writer = std::io::BufWriter::new(std::fs::File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// A point in time `secs` seconds after the epoch.
pub fn epoch_plus(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    filetime::set_file_mtime(path, FileTime::from_system_time(time)).unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}

// =========================================================================
// Tree inspection
// =========================================================================

/// Every file under `root` as a sorted list of `/`-separated relative paths.
pub fn tree_files(root: &Path) -> Vec<String> {
    if !root.exists() {
        return Vec::new();
    }
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    files.sort();
    files
}

/// Drain every event currently buffered in a channel.
pub fn drain<T>(rx: &std::sync::mpsc::Receiver<T>) -> Vec<T> {
    rx.try_iter().collect()
}
