//! Progress events shared by all three operations.
//!
//! Library code never prints. Every per-file result and every phase change
//! is sent as an [`Event`] over an optional `mpsc` channel; the CLI owns the
//! receiving end and turns events into lines with
//! [`output::format_event`](crate::output::format_event). Tests either pass
//! `None` or collect the events and assert on them.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

/// Where a top-level operation is in its lifecycle.
///
/// ```text
/// Idle → Scanning → AwaitingConfirmation → Executing → Done
///                         └──── declined / nothing to do ────→ Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    AwaitingConfirmation,
    Executing,
    Done,
}

impl Phase {
    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Scanning)
                | (Phase::Scanning, Phase::AwaitingConfirmation)
                | (Phase::Scanning, Phase::Done)
                | (Phase::AwaitingConfirmation, Phase::Executing)
                | (Phase::AwaitingConfirmation, Phase::Done)
                | (Phase::Executing, Phase::Done)
        )
    }
}

/// Result for a single transformed or copied file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Destination already existed and `skip_if_exist` is set.
    Skipped,
    /// Re-encoded. `before` is the source size, `after` the output size.
    Encoded {
        before: u64,
        after: u64,
        resized: bool,
    },
    /// Re-encoding produced a bigger file, so the original was copied instead.
    KeptOriginal { before: u64, encoded: u64 },
    Copied { bytes: u64 },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PhaseChanged(Phase),
    /// Classification finished.
    Classified {
        total: usize,
        excluded: usize,
        unmatched: usize,
        transform_count: usize,
        transform_bytes: u64,
        copy_count: usize,
        copy_bytes: u64,
        collisions: Vec<String>,
    },
    Transformed {
        index: usize,
        total: usize,
        path: String,
        outcome: FileOutcome,
    },
    Copied {
        index: usize,
        total: usize,
        path: String,
        outcome: FileOutcome,
    },
    OrphanFound {
        index: usize,
        path: PathBuf,
        size: u64,
    },
    OrphanDeleted {
        index: usize,
        total: usize,
        path: PathBuf,
        error: Option<String>,
    },
    /// Emitted every [`INSPECT_PROGRESS_EVERY`](crate::repair::INSPECT_PROGRESS_EVERY)
    /// files during a timestamp scan.
    Inspected { count: usize },
    DriftFound {
        path: PathBuf,
        current: SystemTime,
        captured: SystemTime,
    },
    CorrectionApplied {
        path: PathBuf,
        error: Option<String>,
    },
}

/// Send an event if anyone is listening. A hung-up receiver is not an error.
pub(crate) fn emit(events: &Option<Sender<Event>>, event: Event) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
