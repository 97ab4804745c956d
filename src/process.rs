//! Transform and copy stages of a mirror run.
//!
//! Takes the transform and copy sets produced by [`classify`](crate::classify)
//! and writes them into the destination tree.
//!
//! ## Transform
//!
//! Each image is identified, shrunk into the configured bounds (never
//! enlarged, orientation kept) and re-encoded in the output format:
//!
//! ```text
//! source ──identify──→ (w, h) ──bound──→ (w', h') ──encode──→ dest
//!                                                      │
//!                    dest bigger than source? ─────────┴─→ copy source over dest
//! ```
//!
//! The output gets the source's modification time, since re-encoding drops
//! the EXIF block that would otherwise date the picture.
//!
//! Jobs run on a bounded rayon pool ([`map_bounded`]). A failing file is
//! reported and the rest of the batch carries on.
//!
//! ## Copy
//!
//! Copy-set files are copied byte for byte, sequentially, with the same
//! existing-destination policy and timestamp preservation.
//!
//! ## Existing destinations
//!
//! | `skip_if_exist` | destination exists | action |
//! |---|---|---|
//! | `true` | yes | skip, no write |
//! | `false` | yes | replace once the new file is complete |
//! | either | no | write |
//!
//! Every job writes to a hidden staging file next to its destination and
//! renames it into place when done. A job that fails drops its staging file,
//! so it never removes output it did not write, even when two sources fold
//! onto the same destination.

use crate::classify::PlannedFile;
use crate::config::{MirrorConfig, effective_threads};
use crate::events::{Event, FileOutcome, emit};
use crate::imaging::{BackendError, EncodeConfig, ImageBackend, encode_bounded};
use crate::workers::map_bounded;
use filetime::FileTime;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::time::SystemTime;
use tempfile::TempPath;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
}

/// Settings for the transform stage.
#[derive(Debug, Clone, Copy)]
pub struct TransformSettings {
    pub encode: EncodeConfig,
    pub skip_if_exist: bool,
    pub keep_original_if_larger: bool,
    /// Resolved worker count, at least 1.
    pub threads: usize,
}

impl TransformSettings {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            encode: EncodeConfig::from_config(config),
            skip_if_exist: config.skip_if_exist,
            keep_original_if_larger: config.keep_original_if_larger,
            threads: effective_threads(config.threads),
        }
    }
}

/// Tally of one stage. Every job lands in exactly one of
/// `written`, `kept_original`, `skipped`, `failed`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub written: usize,
    pub kept_original: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Source bytes of every file written or kept.
    pub bytes_in: u64,
    /// Destination bytes of every file written or kept.
    pub bytes_out: u64,
}

impl StageReport {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a FileOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        match *outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Encoded { before, after, .. } => {
                self.written += 1;
                self.bytes_in += before;
                self.bytes_out += after;
            }
            FileOutcome::KeptOriginal { before, .. } => {
                self.kept_original += 1;
                self.bytes_in += before;
                self.bytes_out += before;
            }
            FileOutcome::Copied { bytes } => {
                self.written += 1;
                self.bytes_in += bytes;
                self.bytes_out += bytes;
            }
            FileOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.kept_original + self.skipped + self.failed
    }
}

/// Create the destination root, emptying it first when `clear` is set.
pub fn prepare_destination(dest_root: &Path, clear: bool) -> std::io::Result<()> {
    if clear && dest_root.exists() {
        tracing::info!(dest = %dest_root.display(), "clearing destination");
        fs::remove_dir_all(dest_root)?;
    }
    fs::create_dir_all(dest_root)
}

/// Re-encode every job into `dest_root` on up to `settings.threads` workers.
pub fn transform_all(
    backend: &impl ImageBackend,
    jobs: &[PlannedFile],
    dest_root: &Path,
    settings: &TransformSettings,
    events: &Option<Sender<Event>>,
) -> StageReport {
    let completed = AtomicUsize::new(0);
    let outcomes = map_bounded(settings.threads, jobs, |job| {
        let outcome = transform_one(backend, job, dest_root, settings);
        let index = completed.fetch_add(1, Ordering::Relaxed) + 1;
        emit(
            events,
            Event::Transformed {
                index,
                total: jobs.len(),
                path: job.source.relative_path.clone(),
                outcome: outcome.clone(),
            },
        );
        outcome
    });
    StageReport::from_outcomes(&outcomes)
}

/// Transform a single file, turning any error into [`FileOutcome::Failed`].
pub fn transform_one(
    backend: &impl ImageBackend,
    job: &PlannedFile,
    dest_root: &Path,
    settings: &TransformSettings,
) -> FileOutcome {
    let output = dest_root.join(&job.destination);
    match try_transform(backend, job, &output, settings) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(source = %job.source.relative_path, "transform failed: {e}");
            FileOutcome::Failed(e.to_string())
        }
    }
}

fn try_transform(
    backend: &impl ImageBackend,
    job: &PlannedFile,
    output: &Path,
    settings: &TransformSettings,
) -> Result<FileOutcome, TransformError> {
    let Some(staged) = stage(output, settings.skip_if_exist)? else {
        return Ok(FileOutcome::Skipped);
    };

    let encoded = encode_bounded(backend, &job.source.absolute_path, &staged, &settings.encode)?;
    let before = job.source.size_bytes;
    let after = fs::metadata(&staged)?.len();

    let outcome = if settings.keep_original_if_larger && after > before {
        tracing::debug!(source = %job.source.relative_path, before, after, "keeping original");
        fs::copy(&job.source.absolute_path, &staged)?;
        FileOutcome::KeptOriginal {
            before,
            encoded: after,
        }
    } else {
        FileOutcome::Encoded {
            before,
            after,
            resized: encoded.resized(),
        }
    };
    preserve_mtime(&staged, job.source.modified)?;
    commit(staged, output)?;
    Ok(outcome)
}

/// Copy every job into `dest_root`, one at a time.
pub fn copy_all(
    jobs: &[PlannedFile],
    dest_root: &Path,
    skip_if_exist: bool,
    events: &Option<Sender<Event>>,
) -> StageReport {
    let mut report = StageReport::default();
    for (i, job) in jobs.iter().enumerate() {
        let output = dest_root.join(&job.destination);
        let outcome = match copy_one(job, &output, skip_if_exist) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(source = %job.source.relative_path, "copy failed: {e}");
                FileOutcome::Failed(e.to_string())
            }
        };
        report.record(&outcome);
        emit(
            events,
            Event::Copied {
                index: i + 1,
                total: jobs.len(),
                path: job.source.relative_path.clone(),
                outcome,
            },
        );
    }
    report
}

fn copy_one(job: &PlannedFile, output: &Path, skip_if_exist: bool) -> std::io::Result<FileOutcome> {
    let Some(staged) = stage(output, skip_if_exist)? else {
        return Ok(FileOutcome::Skipped);
    };
    let bytes = fs::copy(&job.source.absolute_path, &staged)?;
    preserve_mtime(&staged, job.source.modified)?;
    commit(staged, output)?;
    Ok(FileOutcome::Copied { bytes })
}

/// Apply the existing-destination policy and open a staging file beside
/// `output`. `None` means the existing output is kept.
///
/// The staging file is deleted when the returned path is dropped, which is
/// what happens on every error path before [`commit`].
fn stage(output: &Path, skip_if_exist: bool) -> std::io::Result<Option<TempPath>> {
    if skip_if_exist && output.exists() {
        return Ok(None);
    }
    let dir = output.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let staged = tempfile::Builder::new()
        .prefix(".photo-slim-")
        .suffix(".partial")
        .tempfile_in(dir)?
        .into_temp_path();
    Ok(Some(staged))
}

/// Move a finished staging file over `output`.
fn commit(staged: TempPath, output: &Path) -> std::io::Result<()> {
    staged.persist(output).map_err(|e| e.error)
}

fn preserve_mtime(path: &Path, modified: SystemTime) -> std::io::Result<()> {
    filetime::set_file_mtime(path, FileTime::from_system_time(modified))
}
