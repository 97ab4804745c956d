//! Source tree classification.
//!
//! Walks the source root once and sorts every regular file into exactly one
//! bucket:
//!
//! ```text
//!              ┌─ black-listed (full path) ─────────────┐
//! every file ──┼─ fails white list (file stem) ─────────┼─→ excluded
//!              ├─ compress extension ──→ transform set  │
//!              ├─ copy extension ──────→ copy set       │
//!              └─ neither ─────────────→ unmatched ─────┘ (counted apart)
//! ```
//!
//! So `total = transform + copy + excluded + unmatched` always holds.
//! A file matching both extension lists is transformed.
//!
//! Every included file's destination is computed by the [`PathMapper`] and
//! registered in the run's [`DesiredPaths`]. Transformed files register the
//! path with the output extension, which is the name they get on disk.
//!
//! The walk is sorted by file name so classification and every report built
//! from it are deterministic. Symlinks are not followed.

use crate::config::OutputFormat;
use crate::mapping::{DesiredPaths, PathMapper, relative_components};
use crate::rules::ClassificationRules;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot walk source tree: {0}")]
    Traversal(#[from] walkdir::Error),
}

/// A regular file found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub absolute_path: PathBuf,
    /// Relative to the source root, `/`-separated. For display and logs.
    pub relative_path: String,
    /// The relative path split into its components, file name last. Mapping
    /// works on these so a `\` inside a name is never read as a separator.
    pub components: Vec<String>,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// A source file paired with its destination (relative to the dest root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub source: SourceFile,
    pub destination: String,
}

#[derive(Debug, Default)]
pub struct Classification {
    pub transform_set: Vec<PlannedFile>,
    pub copy_set: Vec<PlannedFile>,
    pub total_count: usize,
    pub excluded_count: usize,
    pub unmatched_count: usize,
    pub desired: DesiredPaths,
}

impl Classification {
    pub fn included_count(&self) -> usize {
        self.transform_set.len() + self.copy_set.len()
    }

    pub fn transform_bytes(&self) -> u64 {
        self.transform_set.iter().map(|f| f.source.size_bytes).sum()
    }

    pub fn copy_bytes(&self) -> u64 {
        self.copy_set.iter().map(|f| f.source.size_bytes).sum()
    }

    pub fn collisions(&self) -> Vec<String> {
        self.desired.collisions()
    }
}

/// Which bucket a single file belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Excluded,
    Transform,
    Copy,
    Unmatched,
}

/// Decide the bucket for one file from its full path and file name.
pub fn bucket_for(rules: &ClassificationRules, full_path: &str, file_name: &str) -> Bucket {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    if rules.is_blacklisted(full_path) || !rules.passes_white_list(&stem) {
        Bucket::Excluded
    } else if rules.is_compressible(file_name) {
        Bucket::Transform
    } else if rules.is_copyable(file_name) {
        Bucket::Copy
    } else {
        Bucket::Unmatched
    }
}

pub struct Classifier<'a> {
    rules: &'a ClassificationRules,
    mapper: PathMapper,
    output_format: OutputFormat,
}

impl<'a> Classifier<'a> {
    pub fn new(
        rules: &'a ClassificationRules,
        mapper: PathMapper,
        output_format: OutputFormat,
    ) -> Self {
        Self {
            rules,
            mapper,
            output_format,
        }
    }

    /// Walk `source_root` and classify every regular file under it.
    ///
    /// Any traversal error (missing root, unreadable directory) is fatal:
    /// a partial classification would make orphan detection delete files
    /// whose sources were simply not seen.
    pub fn classify(&self, source_root: &Path) -> Result<Classification, ClassifyError> {
        let root = std::path::absolute(source_root)?;
        let mut classification = Classification::default();

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(components) = relative_components(&root, entry.path()) else {
                continue;
            };
            classification.total_count += 1;

            let full_path = entry.path().to_string_lossy();
            let file_name = entry.file_name().to_string_lossy();
            let new_extension = match bucket_for(self.rules, &full_path, &file_name) {
                Bucket::Excluded => {
                    classification.excluded_count += 1;
                    continue;
                }
                Bucket::Unmatched => {
                    classification.unmatched_count += 1;
                    continue;
                }
                Bucket::Transform => Some(self.output_format.extension()),
                Bucket::Copy => None,
            };

            let relative_path = components.join("/");
            let metadata = entry.metadata()?;
            let destination = self.mapper.map_components(&components, new_extension);
            if !classification.desired.register(destination.clone()) {
                tracing::warn!(%destination, source = %relative_path, "destination collision");
            }

            let planned = PlannedFile {
                source: SourceFile {
                    absolute_path: entry.path().to_path_buf(),
                    relative_path,
                    components,
                    size_bytes: metadata.len(),
                    modified: metadata.modified()?,
                },
                destination,
            };
            if new_extension.is_some() {
                classification.transform_set.push(planned);
            } else {
                classification.copy_set.push(planned);
            }
        }

        tracing::debug!(
            total = classification.total_count,
            transform = classification.transform_set.len(),
            copy = classification.copy_set.len(),
            excluded = classification.excluded_count,
            unmatched = classification.unmatched_count,
            "classified source tree"
        );
        Ok(classification)
    }
}
