//! Mirror configuration.
//!
//! One config file describes one mirror: where the library lives, where the
//! slim copy goes, which files are recompressed or copied, and how far the
//! destination tree may nest before paths are flattened.
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! name = "default"
//! source_dir = "source"
//! dest_dir = "dist"
//! repair_time_dir = "source"
//!
//! compress_extensions = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"]
//! copy_extensions = ["gif", "mp4", "mov", "avi", "mkv", "heic", "heif", "dng"]
//! repair_extensions = ["jpg", "jpeg", "tif", "tiff", "heic", "heif", "png", "webp", "dng"]
//!
//! black_list = ""           # Regex over the full path; empty = exclude nothing
//! white_list = ""           # Regex over the file stem; empty = include all
//!
//! max_depth = 4             # Deeper directories are folded into the file name
//! output_format = "jpg"     # jpg | png | webp | avif
//! quality = 80              # 0-100
//! max_long_size = 3840      # Bound on the longer edge (px)
//! max_short_size = 2160     # Bound on the shorter edge (px)
//!
//! threads = 0               # 0 = all cores, 1 = sequential
//! skip_if_exist = true
//! clear_destination = false
//! keep_original_if_larger = true
//! flatten_hash_suffix = false
//! tolerance_seconds = 60
//! ```
//!
//! Files ending in `.json` are read as JSON, which is how configs from older
//! versions of the tool were stored. Those files use PascalCase keys
//! (`SourceDir`, `DistDir`, `DeepestLevel`, `Thread`, ...); every key accepts
//! its legacy spelling as an alias.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid pattern in {field}: {source}")]
    Pattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Encoded format for transformed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(alias = "jpeg")]
    Jpg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    /// File extension written for this format, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }
}

/// Everything a mirror, sync, or repair run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    /// Display name, shown when the run starts.
    #[serde(alias = "Name")]
    pub name: String,
    /// Root of the library being mirrored.
    #[serde(alias = "SourceDir")]
    pub source_dir: PathBuf,
    /// Root of the slim copy.
    #[serde(alias = "DistDir")]
    pub dest_dir: PathBuf,
    /// Directory whose timestamps `repair` corrects. Often the source or destination.
    #[serde(alias = "RepairTimeDir")]
    pub repair_time_dir: PathBuf,
    /// Extensions (no dot, case-insensitive) that are resized and re-encoded.
    #[serde(alias = "CompressExtensions")]
    pub compress_extensions: Vec<String>,
    /// Extensions copied byte for byte.
    #[serde(alias = "CopyDirectlyExtensions")]
    pub copy_extensions: Vec<String>,
    /// Extensions whose modification time `repair` may correct.
    #[serde(alias = "RepairModifiedTimeExtensions")]
    pub repair_extensions: Vec<String>,
    /// Regex matched against the full path. Matching files are excluded from
    /// the mirror and never considered orphans.
    #[serde(alias = "BlackList")]
    pub black_list: String,
    /// Regex matched against the file stem. Non-matching files are excluded.
    #[serde(alias = "WhiteList")]
    pub white_list: String,
    /// Directory levels kept in the destination before flattening.
    #[serde(alias = "DeepestLevel")]
    pub max_depth: usize,
    #[serde(alias = "OutputFormat")]
    pub output_format: OutputFormat,
    /// Encoder quality (0 = worst, 100 = best).
    #[serde(alias = "Quality")]
    pub quality: u32,
    #[serde(alias = "MaxLongSize")]
    pub max_long_size: u32,
    #[serde(alias = "MaxShortSize")]
    pub max_short_size: u32,
    /// Parallel workers. `0` or negative = all cores, `1` = sequential.
    #[serde(alias = "Thread")]
    pub threads: i32,
    /// Leave existing destination files alone instead of recreating them.
    #[serde(alias = "SkipIfExist")]
    pub skip_if_exist: bool,
    /// Delete the whole destination before a mirror run.
    #[serde(alias = "ClearAllBeforeRunning")]
    pub clear_destination: bool,
    /// Replace an encoded output with the original when encoding made it bigger.
    pub keep_original_if_larger: bool,
    /// Append a short content-independent hash to flattened file names.
    pub flatten_hash_suffix: bool,
    /// Drift between capture time and modification time tolerated by `repair`.
    #[serde(alias = "MaxDurationTolerance")]
    pub tolerance_seconds: u64,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            source_dir: PathBuf::from("source"),
            dest_dir: PathBuf::from("dist"),
            repair_time_dir: PathBuf::from("source"),
            compress_extensions: strings(&["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"]),
            copy_extensions: strings(&["gif", "mp4", "mov", "avi", "mkv", "heic", "heif", "dng"]),
            repair_extensions: strings(&[
                "jpg", "jpeg", "tif", "tiff", "heic", "heif", "png", "webp", "dng",
            ]),
            black_list: String::new(),
            white_list: String::new(),
            max_depth: 4,
            output_format: OutputFormat::Jpg,
            quality: 80,
            max_long_size: 3840,
            max_short_size: 2160,
            threads: 0,
            skip_if_exist: true,
            clear_destination: false,
            keep_original_if_larger: true,
            flatten_hash_suffix: false,
            tolerance_seconds: 60,
        }
    }
}

impl MirrorConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// Pattern syntax is checked separately when the rules are compiled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality > 100 {
            return Err(ConfigError::Validation("quality must be 0-100".into()));
        }
        if self.max_long_size == 0 || self.max_short_size == 0 {
            return Err(ConfigError::Validation(
                "max_long_size and max_short_size must be non-zero".into(),
            ));
        }
        for (field, list) in [
            ("compress_extensions", &self.compress_extensions),
            ("copy_extensions", &self.copy_extensions),
            ("repair_extensions", &self.repair_extensions),
        ] {
            if list.iter().any(|ext| ext.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "{field} must not contain empty entries"
                )));
            }
        }
        Ok(())
    }
}

/// Resolve the effective worker count.
///
/// - `<= 0` → all available cores
/// - `n` → `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(threads: i32) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if threads <= 0 {
        cores
    } else {
        (threads as usize).min(cores)
    }
}

/// Load and validate a config file.
///
/// `.json` files are parsed as JSON, everything else as TOML. Missing keys
/// take their defaults; unknown keys are an error.
pub fn load_config(path: &Path) -> Result<MirrorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let config: MirrorConfig = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photo-slim configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Shown when a run starts.
name = "default"

# ---------------------------------------------------------------------------
# Locations
# ---------------------------------------------------------------------------
# Library to mirror.
source_dir = "source"
# Where the slim copy is written. `sync` deletes files here that no longer
# have a source.
dest_dir = "dist"
# Directory whose file modification times `repair` corrects.
repair_time_dir = "source"

# ---------------------------------------------------------------------------
# File selection
# ---------------------------------------------------------------------------
# Resized and re-encoded into `output_format`.
compress_extensions = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"]
# Copied byte for byte.
copy_extensions = ["gif", "mp4", "mov", "avi", "mkv", "heic", "heif", "dng"]
# Checked by `repair` against their embedded EXIF capture time.
repair_extensions = ["jpg", "jpeg", "tif", "tiff", "heic", "heif", "png", "webp", "dng"]

# Regex over the full file path. Matches are excluded from the mirror and
# are never deleted by `sync`. Empty = exclude nothing.
black_list = ""
# Regex over the file name without extension. Non-matches are excluded.
# Empty = include everything.
white_list = ""

# ---------------------------------------------------------------------------
# Layout
# ---------------------------------------------------------------------------
# Directory levels kept in the destination. Deeper levels are folded into
# the file name: with max_depth = 2, A/B/C/D/x.jpg becomes A/B/C-D-x.jpg.
max_depth = 4
# Append an 8-character hash to flattened names so that different deep
# paths can never fold onto the same file.
flatten_hash_suffix = false

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
# jpg | png | webp | avif
output_format = "jpg"
# Encoder quality (0 = worst, 100 = best).
quality = 80
# Images larger than these bounds are scaled down, keeping aspect ratio.
max_long_size = 3840
max_short_size = 2160
# Keep the original bytes when re-encoding produced a bigger file.
keep_original_if_larger = true

# ---------------------------------------------------------------------------
# Behaviour
# ---------------------------------------------------------------------------
# Parallel workers. 0 = all cores, 1 = sequential.
threads = 0
# Leave existing destination files alone instead of recreating them.
skip_if_exist = true
# Delete the whole destination directory before mirroring.
clear_destination = false
# Seconds of drift between capture time and modification time that `repair`
# tolerates.
tolerance_seconds = 60
"##
}
