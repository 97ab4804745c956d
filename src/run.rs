//! Top-level operations: mirror, sync, repair.
//!
//! Every operation follows the same lifecycle:
//!
//! ```text
//! Idle → Scanning → AwaitingConfirmation → Executing → Done
//! ```
//!
//! Scanning only reads. Nothing on disk changes until the
//! [`ConfirmationGate`] says yes, so a declined run leaves both trees
//! exactly as they were. When the scan finds nothing to do the gate is not
//! asked at all.
//!
//! The gate is a trait so the CLI can prompt on a terminal, `--yes` can
//! approve unattended, and tests can script the answer with a closure.

use crate::classify::{Classification, ClassifyError, Classifier};
use crate::config::{ConfigError, MirrorConfig};
use crate::events::{Event, Phase, emit};
use crate::imaging::ImageBackend;
use crate::mapping::PathMapper;
use crate::metadata::CaptureTimeReader;
use crate::process::{StageReport, TransformSettings, copy_all, prepare_destination, transform_all};
use crate::repair::{ApplyReport, RepairError, RepairSettings, apply_corrections, scan_timestamps};
use crate::rules::ClassificationRules;
use crate::sync::{DeleteReport, OrphanSet, SyncError, delete_orphans, reconcile};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Repair(#[from] RepairError),
    #[error("Cannot prepare destination: {0}")]
    Destination(#[from] std::io::Error),
}

/// Asks whether a scanned operation may go ahead.
pub trait ConfirmationGate {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> ConfirmationGate for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Approves everything. Used for `--yes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl ConfirmationGate for AutoConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        tracing::info!("{prompt} yes (auto-confirmed)");
        true
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Declined,
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSummary {
    pub status: RunStatus,
    pub found: usize,
    pub included: usize,
    pub excluded: usize,
    pub unmatched: usize,
    pub collisions: usize,
    pub transform: StageReport,
    pub copy: StageReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub status: RunStatus,
    pub orphans: usize,
    pub orphan_bytes: u64,
    pub deleted: DeleteReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairSummary {
    pub status: RunStatus,
    pub inspected: usize,
    pub drifted: usize,
    pub applied: ApplyReport,
}

/// Phase tracking plus event emission for one run.
struct Lifecycle {
    phase: Phase,
    events: Option<Sender<Event>>,
}

impl Lifecycle {
    fn new(events: Option<Sender<Event>>) -> Self {
        Self {
            phase: Phase::Idle,
            events,
        }
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transition {:?} → {next:?}",
            self.phase
        );
        tracing::debug!(from = ?self.phase, to = ?next, "phase");
        self.phase = next;
        emit(&self.events, Event::PhaseChanged(next));
    }

    /// Ask the gate. Finishes the run when declined.
    fn confirm(&mut self, gate: &mut dyn ConfirmationGate, prompt: &str) -> bool {
        self.enter(Phase::AwaitingConfirmation);
        let approved = gate.confirm(prompt);
        if approved {
            self.enter(Phase::Executing);
        } else {
            tracing::info!("declined, nothing changed");
            self.enter(Phase::Done);
        }
        approved
    }

    fn emit(&self, event: Event) {
        emit(&self.events, event);
    }
}

/// Classify the source tree without touching anything.
pub fn scan_source(config: &MirrorConfig) -> Result<Classification, RunError> {
    let rules = ClassificationRules::from_config(config)?;
    let classifier = Classifier::new(&rules, PathMapper::from_config(config), config.output_format);
    Ok(classifier.classify(&config.source_dir)?)
}

/// The [`Event::Classified`] report for a finished classification.
pub fn classified_event(c: &Classification) -> Event {
    Event::Classified {
        total: c.total_count,
        excluded: c.excluded_count,
        unmatched: c.unmatched_count,
        transform_count: c.transform_set.len(),
        transform_bytes: c.transform_bytes(),
        copy_count: c.copy_set.len(),
        copy_bytes: c.copy_bytes(),
        collisions: c.collisions(),
    }
}

/// Mirror the source tree into the destination.
pub fn run_mirror(
    config: &MirrorConfig,
    backend: &impl ImageBackend,
    gate: &mut dyn ConfirmationGate,
    events: Option<Sender<Event>>,
) -> Result<MirrorSummary, RunError> {
    let mut life = Lifecycle::new(events);
    life.enter(Phase::Scanning);
    let classification = scan_source(config)?;
    life.emit(classified_event(&classification));

    let mut summary = MirrorSummary {
        status: RunStatus::NothingToDo,
        found: classification.total_count,
        included: classification.included_count(),
        excluded: classification.excluded_count,
        unmatched: classification.unmatched_count,
        collisions: classification.collisions().len(),
        transform: StageReport::default(),
        copy: StageReport::default(),
    };
    if classification.included_count() == 0 {
        life.enter(Phase::Done);
        return Ok(summary);
    }

    let prompt = if config.clear_destination {
        format!(
            "Empty {} and mirror {} files into it?",
            config.dest_dir.display(),
            classification.included_count()
        )
    } else {
        format!(
            "Mirror {} files into {}?",
            classification.included_count(),
            config.dest_dir.display()
        )
    };
    if !life.confirm(gate, &prompt) {
        summary.status = RunStatus::Declined;
        return Ok(summary);
    }

    prepare_destination(&config.dest_dir, config.clear_destination)?;
    summary.transform = transform_all(
        backend,
        &classification.transform_set,
        &config.dest_dir,
        &TransformSettings::from_config(config),
        &life.events,
    );
    summary.copy = copy_all(
        &classification.copy_set,
        &config.dest_dir,
        config.skip_if_exist,
        &life.events,
    );
    summary.status = RunStatus::Completed;
    life.enter(Phase::Done);
    Ok(summary)
}

/// Delete destination files that no source maps to.
pub fn run_sync(
    config: &MirrorConfig,
    gate: &mut dyn ConfirmationGate,
    events: Option<Sender<Event>>,
) -> Result<SyncSummary, RunError> {
    let mut life = Lifecycle::new(events);
    life.enter(Phase::Scanning);
    let orphans = find_config_orphans(config)?;
    for (i, orphan) in orphans.orphans.iter().enumerate() {
        life.emit(Event::OrphanFound {
            index: i + 1,
            path: orphan.path.clone(),
            size: orphan.size_bytes,
        });
    }

    let mut summary = SyncSummary {
        status: RunStatus::NothingToDo,
        orphans: orphans.orphans.len(),
        orphan_bytes: orphans.total_bytes(),
        deleted: DeleteReport::default(),
    };
    if orphans.is_empty() {
        life.enter(Phase::Done);
        return Ok(summary);
    }

    let prompt = format!(
        "Delete {} orphaned files from {}?",
        summary.orphans,
        config.dest_dir.display()
    );
    if !life.confirm(gate, &prompt) {
        summary.status = RunStatus::Declined;
        return Ok(summary);
    }

    summary.deleted = delete_orphans(&orphans, &life.events);
    summary.status = RunStatus::Completed;
    life.enter(Phase::Done);
    Ok(summary)
}

/// Orphans of the configured mirror, without deleting anything.
pub fn find_config_orphans(config: &MirrorConfig) -> Result<OrphanSet, RunError> {
    let rules = ClassificationRules::from_config(config)?;
    Ok(reconcile(
        &config.source_dir,
        &config.dest_dir,
        &rules,
        PathMapper::from_config(config),
        config.output_format,
    )?)
}

/// Reset drifted modification times under `repair_time_dir`.
pub fn run_repair(
    config: &MirrorConfig,
    reader: &impl CaptureTimeReader,
    gate: &mut dyn ConfirmationGate,
    events: Option<Sender<Event>>,
) -> Result<RepairSummary, RunError> {
    let mut life = Lifecycle::new(events);
    life.enter(Phase::Scanning);
    let rules = ClassificationRules::from_config(config)?;
    let scan = scan_timestamps(
        &config.repair_time_dir,
        &rules,
        reader,
        &RepairSettings::from_config(config),
        &life.events,
    )?;

    let mut summary = RepairSummary {
        status: RunStatus::NothingToDo,
        inspected: scan.inspected,
        drifted: scan.corrections.len(),
        applied: ApplyReport::default(),
    };
    if scan.corrections.is_empty() {
        life.enter(Phase::Done);
        return Ok(summary);
    }

    let prompt = format!(
        "Reset the modification time of {} files to their capture time?",
        summary.drifted
    );
    if !life.confirm(gate, &prompt) {
        summary.status = RunStatus::Declined;
        return Ok(summary);
    }

    summary.applied = apply_corrections(&scan.corrections, &life.events);
    summary.status = RunStatus::Completed;
    life.enter(Phase::Done);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::*;
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    struct Fixture {
        _tmp: TempDir,
        config: MirrorConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let source = tmp.path().join("source");
            std::fs::create_dir_all(&source).unwrap();
            let config = MirrorConfig {
                source_dir: source.clone(),
                dest_dir: tmp.path().join("dest"),
                repair_time_dir: source,
                compress_extensions: vec!["jpg".into()],
                copy_extensions: vec!["mp4".into()],
                repair_extensions: vec!["jpg".into()],
                output_format: OutputFormat::Jpg,
                threads: 1,
                ..MirrorConfig::default()
            };
            Self { _tmp: tmp, config }
        }

        fn source(&self) -> &Path {
            &self.config.source_dir
        }

        fn dest(&self) -> &Path {
            &self.config.dest_dir
        }
    }

    fn decline(_: &str) -> bool {
        false
    }

    fn phases(events: &[Event]) -> Vec<Phase> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::PhaseChanged(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    struct Always(SystemTime);

    impl CaptureTimeReader for Always {
        fn capture_time(&self, _: &Path) -> Option<SystemTime> {
            Some(self.0)
        }
    }

    // =========================================================================
    // Mirror
    // =========================================================================

    #[test]
    fn mirror_runs_both_stages_after_confirmation() {
        let f = Fixture::new();
        write_sized(f.source(), "a.jpg", 50);
        write_sized(f.source(), "clip.mp4", 5);
        write_sized(f.source(), "notes.txt", 5);
        let backend = MockBackend::new().writing(10);
        let (tx, rx) = std::sync::mpsc::channel();
        let mut prompts = Vec::new();

        let summary = run_mirror(
            &f.config,
            &backend,
            &mut |p: &str| {
                prompts.push(p.to_string());
                true
            },
            Some(tx),
        )
        .unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.found, 3);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.transform.written, 1);
        assert_eq!(summary.copy.written, 1);
        assert_eq!(tree_files(f.dest()), vec!["a.jpg", "clip.mp4"]);
        assert_eq!(prompts.len(), 1);
        assert_eq!(
            phases(&drain(&rx)),
            vec![
                Phase::Scanning,
                Phase::AwaitingConfirmation,
                Phase::Executing,
                Phase::Done
            ]
        );
    }

    #[test]
    fn declined_mirror_touches_nothing() {
        let mut f = Fixture::new();
        f.config.clear_destination = true;
        write_sized(f.source(), "a.jpg", 50);
        write_sized(f.dest(), "existing.jpg", 1);
        let backend = MockBackend::new();

        let summary = run_mirror(&f.config, &backend, &mut decline, None).unwrap();

        assert_eq!(summary.status, RunStatus::Declined);
        assert!(backend.get_operations().is_empty());
        assert_eq!(tree_files(f.dest()), vec!["existing.jpg"]);
    }

    #[test]
    fn clear_destination_applies_after_confirmation() {
        let mut f = Fixture::new();
        f.config.clear_destination = true;
        write_sized(f.source(), "a.jpg", 50);
        write_sized(f.dest(), "existing.jpg", 1);
        let mut asked = String::new();

        run_mirror(
            &f.config,
            &MockBackend::new().writing(10),
            &mut |p: &str| {
                asked = p.to_string();
                true
            },
            None,
        )
        .unwrap();

        assert!(asked.starts_with("Empty "));
        assert_eq!(tree_files(f.dest()), vec!["a.jpg"]);
    }

    #[test]
    fn empty_source_skips_the_gate() {
        let f = Fixture::new();
        let mut asked = false;
        let summary = run_mirror(
            &f.config,
            &MockBackend::new(),
            &mut |_: &str| {
                asked = true;
                true
            },
            None,
        )
        .unwrap();
        assert_eq!(summary.status, RunStatus::NothingToDo);
        assert!(!asked);
        assert!(!f.dest().exists());
    }

    #[test]
    fn invalid_pattern_fails_before_scanning() {
        let mut f = Fixture::new();
        f.config.black_list = "([unclosed".into();
        let result = run_mirror(&f.config, &MockBackend::new(), &mut AutoConfirm, None);
        assert!(matches!(result, Err(RunError::Config(ConfigError::Pattern { .. }))));
    }

    // =========================================================================
    // Sync
    // =========================================================================

    #[test]
    fn sync_deletes_orphans_once() {
        let f = Fixture::new();
        write_sized(f.source(), "a.jpg", 1);
        write_sized(f.dest(), "a.jpg", 1);
        write_sized(f.dest(), "orphan.jpg", 4);

        let first = run_sync(&f.config, &mut AutoConfirm, None).unwrap();
        assert_eq!(first.status, RunStatus::Completed);
        assert_eq!(first.orphans, 1);
        assert_eq!(first.orphan_bytes, 4);
        assert_eq!(first.deleted.deleted, 1);
        assert_eq!(tree_files(f.dest()), vec!["a.jpg"]);

        let second = run_sync(&f.config, &mut AutoConfirm, None).unwrap();
        assert_eq!(second.status, RunStatus::NothingToDo);
        assert_eq!(second.deleted, DeleteReport::default());
    }

    #[test]
    fn declined_sync_deletes_nothing() {
        let f = Fixture::new();
        write_sized(f.dest(), "orphan.jpg", 4);
        let (tx, rx) = std::sync::mpsc::channel();

        let summary = run_sync(&f.config, &mut decline, Some(tx)).unwrap();

        assert_eq!(summary.status, RunStatus::Declined);
        assert_eq!(tree_files(f.dest()), vec!["orphan.jpg"]);
        let events = drain(&rx);
        assert!(events.iter().any(|e| matches!(e, Event::OrphanFound { index: 1, .. })));
        assert_eq!(
            phases(&events),
            vec![Phase::Scanning, Phase::AwaitingConfirmation, Phase::Done]
        );
    }

    #[test]
    fn mirror_then_sync_finds_nothing() {
        let f = Fixture::new();
        write_sized(f.source(), "2019/a/b/c/d/e.jpg", 50);
        write_sized(f.source(), "clip.mp4", 5);
        run_mirror(&f.config, &MockBackend::new().writing(10), &mut AutoConfirm, None).unwrap();

        let summary = run_sync(&f.config, &mut AutoConfirm, None).unwrap();
        assert_eq!(summary.status, RunStatus::NothingToDo);
    }

    // =========================================================================
    // Repair
    // =========================================================================

    #[test]
    fn repair_applies_after_confirmation() {
        let f = Fixture::new();
        let path: PathBuf = write_sized(f.source(), "a.jpg", 1);
        set_mtime(&path, epoch_plus(2_000_000_000));
        let reader = Always(epoch_plus(1_000_000_000));

        let summary = run_repair(&f.config, &reader, &mut AutoConfirm, None).unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.drifted, 1);
        assert_eq!(summary.applied.applied, 1);
        assert_eq!(mtime(&path), epoch_plus(1_000_000_000));
    }

    #[test]
    fn declined_repair_keeps_timestamps() {
        let f = Fixture::new();
        let path = write_sized(f.source(), "a.jpg", 1);
        set_mtime(&path, epoch_plus(2_000_000_000));

        let summary =
            run_repair(&f.config, &Always(epoch_plus(1_000_000_000)), &mut decline, None).unwrap();

        assert_eq!(summary.status, RunStatus::Declined);
        assert_eq!(mtime(&path), epoch_plus(2_000_000_000));
    }

    #[test]
    fn repair_without_drift_skips_the_gate() {
        let f = Fixture::new();
        let path = write_sized(f.source(), "a.jpg", 1);
        set_mtime(&path, epoch_plus(1_000_000_030));

        let summary = run_repair(
            &f.config,
            &Always(epoch_plus(1_000_000_000)),
            &mut |_: &str| -> bool { panic!("gate must not be asked") },
            None,
        )
        .unwrap();
        assert_eq!(summary.status, RunStatus::NothingToDo);
        assert_eq!(summary.inspected, 1);
    }
}
