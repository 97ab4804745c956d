//! Modification time repair.
//!
//! Scans a directory for repairable files whose modification time has
//! drifted from the capture time recorded in their metadata, then sets the
//! modification time back to the capture time.
//!
//! A file is flagged when `|mtime − capture| > tolerance`. Exactly equal to
//! the tolerance is not drift. Files without a readable capture time are
//! never flagged.
//!
//! Reading metadata is the slow part, so the scan runs on a bounded worker
//! pool and reports progress every [`INSPECT_PROGRESS_EVERY`] files.
//! Corrections come back in walk order regardless of which worker found them.

use crate::config::{MirrorConfig, effective_threads};
use crate::events::{Event, emit};
use crate::metadata::CaptureTimeReader;
use crate::rules::ClassificationRules;
use crate::workers::map_bounded;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use walkdir::WalkDir;

/// How many inspected files between two [`Event::Inspected`] updates.
pub const INSPECT_PROGRESS_EVERY: usize = 1000;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot walk repair tree: {0}")]
    Traversal(#[from] walkdir::Error),
}

/// How far a file's timestamp is off, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Up to a day.
    Minor,
    /// More than a day.
    Moderate,
    /// More than 30 days.
    High,
    /// More than a year.
    Severe,
}

impl Severity {
    pub fn from_drift(drift: Duration) -> Self {
        if drift > DAY * 365 {
            Severity::Severe
        } else if drift > DAY * 30 {
            Severity::High
        } else if drift > DAY {
            Severity::Moderate
        } else {
            Severity::Minor
        }
    }
}

/// A file whose modification time should become its capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifCorrection {
    pub path: PathBuf,
    pub current: SystemTime,
    pub captured: SystemTime,
}

impl ExifCorrection {
    pub fn drift(&self) -> Duration {
        drift_between(self.current, self.captured)
    }

    pub fn severity(&self) -> Severity {
        Severity::from_drift(self.drift())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairScan {
    pub corrections: Vec<ExifCorrection>,
    /// Repairable files examined.
    pub inspected: usize,
    /// Repairable files with no readable capture time.
    pub without_capture_time: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
}

/// Scan settings.
#[derive(Debug, Clone, Copy)]
pub struct RepairSettings {
    pub tolerance: Duration,
    pub threads: usize,
}

impl RepairSettings {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            tolerance: Duration::from_secs(config.tolerance_seconds),
            threads: effective_threads(config.threads),
        }
    }
}

/// Absolute difference between two instants.
fn drift_between(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b).unwrap_or_else(|e| e.duration())
}

/// Whether `current` is further than `tolerance` from `captured`.
pub fn exceeds_tolerance(current: SystemTime, captured: SystemTime, tolerance: Duration) -> bool {
    drift_between(current, captured) > tolerance
}

enum Inspection {
    Drifted(ExifCorrection),
    InTolerance,
    NoCaptureTime,
}

/// Find every repairable file under `root` whose timestamp has drifted.
pub fn scan_timestamps(
    root: &Path,
    rules: &ClassificationRules,
    reader: &impl CaptureTimeReader,
    settings: &RepairSettings,
    events: &Option<Sender<Event>>,
) -> Result<RepairScan, RepairError> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && rules.is_repairable(&entry.file_name().to_string_lossy())
        {
            candidates.push(entry.into_path());
        }
    }

    let inspected = AtomicUsize::new(0);
    let inspections = map_bounded(settings.threads, &candidates, |path| {
        let result = inspect(path, reader, settings.tolerance);
        let count = inspected.fetch_add(1, Ordering::Relaxed) + 1;
        if count % INSPECT_PROGRESS_EVERY == 0 {
            emit(events, Event::Inspected { count });
        }
        if let Inspection::Drifted(c) = &result {
            emit(
                events,
                Event::DriftFound {
                    path: c.path.clone(),
                    current: c.current,
                    captured: c.captured,
                },
            );
        }
        result
    });

    let mut scan = RepairScan {
        inspected: candidates.len(),
        ..RepairScan::default()
    };
    for inspection in inspections {
        match inspection {
            Inspection::Drifted(correction) => scan.corrections.push(correction),
            Inspection::NoCaptureTime => scan.without_capture_time += 1,
            Inspection::InTolerance => {}
        }
    }
    tracing::debug!(
        inspected = scan.inspected,
        drifted = scan.corrections.len(),
        "timestamp scan finished"
    );
    Ok(scan)
}

fn inspect(path: &Path, reader: &impl CaptureTimeReader, tolerance: Duration) -> Inspection {
    let Some(captured) = reader.capture_time(path) else {
        return Inspection::NoCaptureTime;
    };
    let current = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(path = %path.display(), "cannot read modification time: {e}");
            return Inspection::NoCaptureTime;
        }
    };
    if exceeds_tolerance(current, captured, tolerance) {
        Inspection::Drifted(ExifCorrection {
            path: path.to_path_buf(),
            current,
            captured,
        })
    } else {
        Inspection::InTolerance
    }
}

/// Set each file's modification time to its capture time.
pub fn apply_corrections(
    corrections: &[ExifCorrection],
    events: &Option<Sender<Event>>,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    for correction in corrections {
        let captured = FileTime::from_system_time(correction.captured);
        let result = filetime::set_file_mtime(&correction.path, captured);
        let error = match result {
            Ok(()) => {
                report.applied += 1;
                None
            }
            Err(e) => {
                tracing::warn!(path = %correction.path.display(), "cannot set time: {e}");
                report.failed += 1;
                Some(e.to_string())
            }
        };
        emit(
            events,
            Event::CorrectionApplied {
                path: correction.path.clone(),
                error,
            },
        );
    }
    report
}
