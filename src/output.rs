//! CLI output formatting for all three operations.
//!
//! # Output Format
//!
//! ## Mirror
//!
//! ```text
//! ==> Scanning
//! Found 5 files
//!     Transform: 3 (12.40 MB)
//!     Copy: 1 (80.00 MB)
//!     Excluded: 1
//!     Unmatched: 0
//! ==> Executing
//! [1/3] 2019/Trip/a.jpg  encoded 4.20 MB → 1.10 MB (-74%)
//! [2/3] 2019/Trip/b.png  kept original (encoded 2.00 MB > 1.50 MB)
//! [3/3] 2019/c.jpg  exists, skipped
//! [1/1] clip.mp4  copied 80.00 MB
//! Found 5 files: 4 included, 1 excluded, 0 unmatched
//! Transformed 1, kept 1, skipped 1, failed 0: 5.70 MB → 2.60 MB
//! Copied 1, skipped 0, failed 0: 80.00 MB
//! ```
//!
//! ## Sync
//!
//! ```text
//! 001 old/IMG_0001.jpg (1.20 MB)
//! [1/1] deleted old/IMG_0001.jpg
//! Deleted 1 of 1 orphans, freed 1.20 MB
//! ```
//!
//! ## Repair
//!
//! ```text
//! [severe] /photos/2009/IMG_0001.jpg
//!     mtime 2021-03-04 10:00:00, captured 2009-07-01 16:20:11 (4263d 17h)
//! ```
//!
//! # Architecture
//!
//! Every function here is pure and returns `Vec<String>` (or a `String`) so
//! it can be tested without capturing stdout. The CLI prints the lines.

use crate::events::{Event, FileOutcome, Phase};
use crate::repair::Severity;
use crate::run::{MirrorSummary, RepairSummary, RunStatus, SyncSummary};
use chrono::{DateTime, Local};
use std::path::Path;
use std::time::{Duration, SystemTime};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn progress(index: usize, total: usize) -> String {
    format!("[{index}/{total}]")
}

/// Human-readable byte count with two decimals, binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Local wall-clock time, second precision.
pub fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Coarse duration: the two most significant units.
///
/// ```text
/// 4263d 17h | 3h 12m | 12m 5s | 42s
/// ```
pub fn format_drift(drift: Duration) -> String {
    let secs = drift.as_secs();
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        secs % 86_400 / 3_600,
        secs % 3_600 / 60,
        secs % 60,
    );
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Minor => "minor",
        Severity::Moderate => "moderate",
        Severity::High => "high",
        Severity::Severe => "severe",
    }
}

fn savings(before: u64, after: u64) -> String {
    if before == 0 {
        return String::new();
    }
    let percent = (after as f64 / before as f64 - 1.0) * 100.0;
    format!(" ({percent:+.0}%)")
}

/// One-line description of a per-file outcome.
pub fn format_outcome(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Skipped => "exists, skipped".to_string(),
        FileOutcome::Encoded {
            before,
            after,
            resized,
        } => format!(
            "{} {} → {}{}",
            if *resized { "resized" } else { "encoded" },
            format_size(*before),
            format_size(*after),
            savings(*before, *after)
        ),
        FileOutcome::KeptOriginal { before, encoded } => format!(
            "kept original (encoded {} > {})",
            format_size(*encoded),
            format_size(*before)
        ),
        FileOutcome::Copied { bytes } => format!("copied {}", format_size(*bytes)),
        FileOutcome::Failed(e) => format!("FAILED: {e}"),
    }
}

// ============================================================================
// Events
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_event(event: &Event) -> Vec<String> {
    match event {
        Event::PhaseChanged(Phase::Scanning) => vec!["==> Scanning".to_string()],
        Event::PhaseChanged(Phase::Executing) => vec!["==> Executing".to_string()],
        Event::PhaseChanged(_) => Vec::new(),
        Event::Classified {
            total,
            excluded,
            unmatched,
            transform_count,
            transform_bytes,
            copy_count,
            copy_bytes,
            collisions,
        } => {
            let mut lines = vec![
                format!("Found {total} files"),
                format!(
                    "{}Transform: {transform_count} ({})",
                    indent(1),
                    format_size(*transform_bytes)
                ),
                format!("{}Copy: {copy_count} ({})", indent(1), format_size(*copy_bytes)),
                format!("{}Excluded: {excluded}", indent(1)),
                format!("{}Unmatched: {unmatched}", indent(1)),
            ];
            if !collisions.is_empty() {
                lines.push(format!(
                    "Collisions ({}): last file written wins",
                    collisions.len()
                ));
                lines.extend(collisions.iter().map(|c| format!("{}{c}", indent(1))));
            }
            lines
        }
        Event::Transformed {
            index,
            total,
            path,
            outcome,
        }
        | Event::Copied {
            index,
            total,
            path,
            outcome,
        } => vec![format!(
            "{} {path}  {}",
            progress(*index, *total),
            format_outcome(outcome)
        )],
        Event::OrphanFound { index, path, size } => vec![format!(
            "{} {} ({})",
            format_index(*index),
            path.display(),
            format_size(*size)
        )],
        Event::OrphanDeleted {
            index,
            total,
            path,
            error,
        } => vec![match error {
            None => format!("{} deleted {}", progress(*index, *total), path.display()),
            Some(e) => format!("{} FAILED {}: {e}", progress(*index, *total), path.display()),
        }],
        Event::Inspected { count } => vec![format!("{}inspected {count} files", indent(1))],
        Event::DriftFound {
            path,
            current,
            captured,
        } => format_drift_found(path, *current, *captured),
        Event::CorrectionApplied { path, error } => vec![match error {
            None => format!("fixed {}", path.display()),
            Some(e) => format!("FAILED {}: {e}", path.display()),
        }],
    }
}

fn format_drift_found(path: &Path, current: SystemTime, captured: SystemTime) -> Vec<String> {
    let drift = current
        .duration_since(captured)
        .unwrap_or_else(|e| e.duration());
    vec![
        format!(
            "[{}] {}",
            severity_label(Severity::from_drift(drift)),
            path.display()
        ),
        format!(
            "{}mtime {}, captured {} ({})",
            indent(1),
            format_time(current),
            format_time(captured),
            format_drift(drift)
        ),
    ]
}

// ============================================================================
// Summaries
// ============================================================================

fn status_line(status: RunStatus, what: &str) -> Option<String> {
    match status {
        RunStatus::Completed => None,
        RunStatus::Declined => Some(format!("Declined: no {what} performed")),
        RunStatus::NothingToDo => Some(format!("Nothing to do: no {what} needed")),
    }
}

pub fn format_mirror_summary(summary: &MirrorSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Found {} files: {} included, {} excluded, {} unmatched",
        summary.found, summary.included, summary.excluded, summary.unmatched
    )];
    if let Some(line) = status_line(summary.status, "files written") {
        lines.push(line);
        return lines;
    }
    let t = &summary.transform;
    let c = &summary.copy;
    lines.extend([
        format!(
            "Transformed {}, kept {}, skipped {}, failed {}: {} → {}",
            t.written,
            t.kept_original,
            t.skipped,
            t.failed,
            format_size(t.bytes_in),
            format_size(t.bytes_out)
        ),
        format!(
            "Copied {}, skipped {}, failed {}: {}",
            c.written,
            c.skipped,
            c.failed,
            format_size(c.bytes_out)
        ),
    ]);
    if summary.collisions > 0 {
        lines.push(format!(
            "{} destination collisions (set flatten_hash_suffix to keep every file)",
            summary.collisions
        ));
    }
    lines
}

pub fn format_sync_summary(summary: &SyncSummary) -> Vec<String> {
    if summary.status == RunStatus::NothingToDo {
        return vec!["No orphans: destination matches source".to_string()];
    }
    if let Some(line) = status_line(summary.status, "deletions") {
        return vec![
            format!(
                "{} orphans ({})",
                summary.orphans,
                format_size(summary.orphan_bytes)
            ),
            line,
        ];
    }
    let mut lines = vec![format!(
        "Deleted {} of {} orphans, freed {}",
        summary.deleted.deleted,
        summary.orphans,
        format_size(summary.deleted.bytes_freed)
    )];
    if summary.deleted.failed > 0 {
        lines.push(format!("{} deletions failed", summary.deleted.failed));
    }
    lines
}

pub fn format_repair_summary(summary: &RepairSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Inspected {} files, {} drifted",
        summary.inspected, summary.drifted
    )];
    if let Some(line) = status_line(summary.status, "corrections") {
        lines.push(line);
        return lines;
    }
    lines.push(format!(
        "Fixed {}, failed {}",
        summary.applied.applied, summary.applied.failed
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::StageReport;
    use crate::repair::ApplyReport;
    use crate::sync::DeleteReport;
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_single_digit() {
        assert_eq!(format_index(1), "001");
    }

    #[test]
    fn format_index_large() {
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn format_drift_picks_two_largest_units() {
        assert_eq!(format_drift(Duration::from_secs(42)), "42s");
        assert_eq!(format_drift(Duration::from_secs(12 * 60 + 5)), "12m 5s");
        assert_eq!(format_drift(Duration::from_secs(3 * 3600 + 12 * 60)), "3h 12m");
        assert_eq!(format_drift(Duration::from_secs(2 * 86_400 + 3600)), "2d 1h");
    }

    #[test]
    fn savings_shows_signed_percentage() {
        assert_eq!(savings(100, 25), " (-75%)");
        assert_eq!(savings(100, 150), " (+50%)");
        assert_eq!(savings(0, 10), "");
    }

    // =========================================================================
    // Event tests
    // =========================================================================

    #[test]
    fn transformed_event_line() {
        let lines = format_event(&Event::Transformed {
            index: 2,
            total: 10,
            path: "2019/a.jpg".into(),
            outcome: FileOutcome::Encoded {
                before: 4096,
                after: 1024,
                resized: true,
            },
        });
        assert_eq!(lines, vec!["[2/10] 2019/a.jpg  resized 4.00 KB → 1.00 KB (-75%)"]);
    }

    #[test]
    fn skipped_and_failed_outcomes() {
        assert_eq!(format_outcome(&FileOutcome::Skipped), "exists, skipped");
        assert_eq!(
            format_outcome(&FileOutcome::Failed("bad header".into())),
            "FAILED: bad header"
        );
        assert_eq!(
            format_outcome(&FileOutcome::KeptOriginal {
                before: 1024,
                encoded: 2048
            }),
            "kept original (encoded 2.00 KB > 1.00 KB)"
        );
    }

    #[test]
    fn classified_event_lists_buckets_and_collisions() {
        let lines = format_event(&Event::Classified {
            total: 5,
            excluded: 1,
            unmatched: 1,
            transform_count: 2,
            transform_bytes: 2048,
            copy_count: 1,
            copy_bytes: 10,
            collisions: vec!["A/B-C-x.jpg".into()],
        });
        assert_eq!(lines[0], "Found 5 files");
        assert_eq!(lines[1], "    Transform: 2 (2.00 KB)");
        assert_eq!(lines[2], "    Copy: 1 (10 B)");
        assert_eq!(lines[5], "Collisions (1): last file written wins");
        assert_eq!(lines[6], "    A/B-C-x.jpg");
    }

    #[test]
    fn quiet_phases_print_nothing() {
        assert!(format_event(&Event::PhaseChanged(Phase::AwaitingConfirmation)).is_empty());
        assert!(format_event(&Event::PhaseChanged(Phase::Done)).is_empty());
        assert_eq!(
            format_event(&Event::PhaseChanged(Phase::Scanning)),
            vec!["==> Scanning"]
        );
    }

    #[test]
    fn orphan_events() {
        let path = PathBuf::from("old/a.jpg");
        assert_eq!(
            format_event(&Event::OrphanFound {
                index: 1,
                path: path.clone(),
                size: 2048
            }),
            vec!["001 old/a.jpg (2.00 KB)"]
        );
        assert_eq!(
            format_event(&Event::OrphanDeleted {
                index: 1,
                total: 2,
                path,
                error: Some("denied".into())
            }),
            vec!["[1/2] FAILED old/a.jpg: denied"]
        );
    }

    #[test]
    fn drift_event_shows_severity_and_both_times() {
        let captured = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        let current = captured + Duration::from_secs(400 * 86_400);
        let lines = format_event(&Event::DriftFound {
            path: PathBuf::from("a.jpg"),
            current,
            captured,
        });
        assert_eq!(lines[0], "[severe] a.jpg");
        assert!(lines[1].contains(&format_time(captured)));
        assert!(lines[1].ends_with("(400d 0h)"));
    }

    // =========================================================================
    // Summary tests
    // =========================================================================

    #[test]
    fn mirror_summary_completed() {
        let summary = MirrorSummary {
            status: RunStatus::Completed,
            found: 3,
            included: 2,
            excluded: 0,
            unmatched: 0,
            collisions: 1,
            transform: StageReport {
                written: 2,
                bytes_in: 2048,
                bytes_out: 1024,
                ..StageReport::default()
            },
            copy: StageReport::default(),
        };
        let lines = format_mirror_summary(&summary);
        assert_eq!(
            lines[0],
            "Found 3 files: 2 included, 0 excluded, 0 unmatched"
        );
        assert_eq!(
            lines[1],
            "Transformed 2, kept 0, skipped 0, failed 0: 2.00 KB → 1.00 KB"
        );
        assert!(lines[3].starts_with("1 destination collisions"));
    }

    #[test]
    fn declined_summaries_say_so() {
        let sync = SyncSummary {
            status: RunStatus::Declined,
            orphans: 2,
            orphan_bytes: 2048,
            deleted: DeleteReport::default(),
        };
        assert_eq!(
            format_sync_summary(&sync),
            vec!["2 orphans (2.00 KB)", "Declined: no deletions performed"]
        );

        let repair = RepairSummary {
            status: RunStatus::Declined,
            inspected: 10,
            drifted: 2,
            applied: ApplyReport::default(),
        };
        assert_eq!(
            format_repair_summary(&repair),
            vec!["Inspected 10 files, 2 drifted", "Declined: no corrections performed"]
        );
    }

    #[test]
    fn empty_sync_reports_match() {
        let sync = SyncSummary {
            status: RunStatus::NothingToDo,
            orphans: 0,
            orphan_bytes: 0,
            deleted: DeleteReport::default(),
        };
        assert_eq!(
            format_sync_summary(&sync),
            vec!["No orphans: destination matches source"]
        );
    }
}
