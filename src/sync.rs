//! Orphan detection and removal.
//!
//! An orphan is a file in the destination tree that no current source file
//! maps to: its source was deleted, renamed, or moved, or the mapping
//! settings changed since it was written.
//!
//! ```text
//! source tree ──classify──→ desired destinations ─┐
//!                                                 ├─→ orphans = actual − desired
//! dest tree ───walk───────→ actual files ─────────┘
//! ```
//!
//! Desired destinations are recomputed with the pure [`PathMapper::map`], so
//! detection never touches a registry owned by a mirror run.
//!
//! Destination files matching the black list are never orphans. This lets
//! hand-placed files (an index, a `.nomedia` marker) live alongside the
//! mirror.
//!
//! Sync after a mirror with the same config finds nothing; sync twice in a
//! row deletes nothing the second time.

use crate::classify::{Classification, ClassifyError, Classifier};
use crate::config::OutputFormat;
use crate::events::{Event, emit};
use crate::mapping::{PathMapper, relative_key};
use crate::rules::ClassificationRules;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("Cannot walk destination tree: {0}")]
    Traversal(#[from] walkdir::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub path: PathBuf,
    /// Relative to the destination root, `/`-separated.
    pub relative: String,
    pub size_bytes: u64,
}

/// Result of comparing the destination against the desired set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OrphanSet {
    /// Sorted by relative path.
    pub orphans: Vec<Orphan>,
    /// Number of destinations the source tree maps to.
    pub desired_count: usize,
    /// Regular files found in the destination.
    pub scanned_count: usize,
    /// Destination files kept because they match the black list.
    pub protected_count: usize,
}

impl OrphanSet {
    pub fn total_bytes(&self) -> u64 {
        self.orphans.iter().map(|o| o.size_bytes).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
    pub bytes_freed: u64,
}

/// Recompute every destination a classification maps to.
pub fn desired_destinations(
    classification: &Classification,
    mapper: &PathMapper,
    output_format: OutputFormat,
) -> HashSet<String> {
    let transformed = classification
        .transform_set
        .iter()
        .map(|f| mapper.map_components(&f.source.components, Some(output_format.extension())));
    let copied = classification
        .copy_set
        .iter()
        .map(|f| mapper.map_components(&f.source.components, None));
    transformed.chain(copied).collect()
}

/// Walk `dest_root` and collect every file not in `desired`.
///
/// A missing destination root has no orphans.
pub fn find_orphans(
    dest_root: &Path,
    desired: &HashSet<String>,
    rules: &ClassificationRules,
) -> Result<OrphanSet, SyncError> {
    let mut set = OrphanSet {
        desired_count: desired.len(),
        ..OrphanSet::default()
    };
    if !dest_root.exists() {
        return Ok(set);
    }
    let root = std::path::absolute(dest_root)?;

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_key(&root, entry.path()) else {
            continue;
        };
        set.scanned_count += 1;
        if desired.contains(&relative) {
            continue;
        }
        if rules.is_blacklisted(&entry.path().to_string_lossy()) {
            set.protected_count += 1;
            continue;
        }
        set.orphans.push(Orphan {
            path: entry.path().to_path_buf(),
            relative,
            size_bytes: entry.metadata()?.len(),
        });
    }
    Ok(set)
}

/// Classify the source, then find orphans under `dest_root`.
pub fn reconcile(
    source_root: &Path,
    dest_root: &Path,
    rules: &ClassificationRules,
    mapper: PathMapper,
    output_format: OutputFormat,
) -> Result<OrphanSet, SyncError> {
    let classification = Classifier::new(rules, mapper, output_format).classify(source_root)?;
    let desired = desired_destinations(&classification, &mapper, output_format);
    find_orphans(dest_root, &desired, rules)
}

/// Delete every orphan. Failures are counted, not fatal.
pub fn delete_orphans(orphans: &OrphanSet, events: &Option<Sender<Event>>) -> DeleteReport {
    let mut report = DeleteReport::default();
    let total = orphans.orphans.len();
    for (i, orphan) in orphans.orphans.iter().enumerate() {
        let error = match std::fs::remove_file(&orphan.path) {
            Ok(()) => {
                report.deleted += 1;
                report.bytes_freed += orphan.size_bytes;
                None
            }
            Err(e) => {
                tracing::warn!(path = %orphan.path.display(), "delete failed: {e}");
                report.failed += 1;
                Some(e.to_string())
            }
        };
        emit(
            events,
            Event::OrphanDeleted {
                index: i + 1,
                total,
                path: orphan.path.clone(),
                error,
            },
        );
    }
    report
}
