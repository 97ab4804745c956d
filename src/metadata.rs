//! Capture timestamp extraction.
//!
//! A photo's modification time is easy to lose: copying between devices,
//! restoring from a cloud backup, or editing a caption all rewrite it. The
//! moment the picture was taken is still embedded in its EXIF block, and
//! that is what `repair` puts back.
//!
//! ## Resolution priority
//!
//! The first tag present with a valid date wins:
//!
//! 1. `DateTimeOriginal` (Exif IFD): when the shutter fired
//! 2. `DateTimeDigitized` (Exif IFD): when the image was digitised
//! 3. `DateTime` (IFD0): last modification of the file by the camera/software
//!
//! Each tag is paired with its `OffsetTime*` companion. With an offset the
//! timestamp is exact; without one it is read as local time, which is what
//! cameras record.
//!
//! Unreadable files, files without EXIF, and placeholder dates such as
//! `0000:00:00 00:00:00` all resolve to `None`: nothing to correct.

use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use exif::{Exif, In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::SystemTime;

/// Tags consulted in priority order, each with its UTC-offset companion.
const CAPTURE_TAGS: [(Tag, Tag); 3] = [
    (Tag::DateTimeOriginal, Tag::OffsetTimeOriginal),
    (Tag::DateTimeDigitized, Tag::OffsetTimeDigitized),
    (Tag::DateTime, Tag::OffsetTime),
];

/// Source of capture timestamps.
///
/// `Sync` so the timestamp scan can share one reader across workers.
pub trait CaptureTimeReader: Sync {
    /// When the content of `path` was recorded, if the file says.
    fn capture_time(&self, path: &Path) -> Option<SystemTime>;
}

/// Reads capture times from EXIF data via `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifTimeReader;

impl CaptureTimeReader for ExifTimeReader {
    fn capture_time(&self, path: &Path) -> Option<SystemTime> {
        let file = File::open(path).ok()?;
        let exif = exif::Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .map_err(|e| tracing::trace!(path = %path.display(), "no EXIF: {e}"))
            .ok()?;
        capture_time_from_exif(&exif)
    }
}

/// Resolve the capture time from parsed EXIF using the tag priority above.
pub fn capture_time_from_exif(exif: &Exif) -> Option<SystemTime> {
    resolve(
        CAPTURE_TAGS
            .iter()
            .map(|&(tag, offset_tag)| read_date_time(exif, tag, offset_tag)),
    )
}

/// First available candidate wins.
pub fn resolve<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

fn ascii_value(exif: &Exif, tag: Tag) -> Option<&[u8]> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values.first().map(Vec::as_slice),
        _ => None,
    }
}

fn read_date_time(exif: &Exif, tag: Tag, offset_tag: Tag) -> Option<SystemTime> {
    let mut date_time = exif::DateTime::from_ascii(ascii_value(exif, tag)?).ok()?;
    if let Some(offset) = ascii_value(exif, offset_tag) {
        // A malformed offset falls back to local time
        let _ = date_time.parse_offset(offset);
    }
    to_system_time(&date_time)
}

fn to_system_time(dt: &exif::DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?;
    let time = NaiveTime::from_hms_nano_opt(
        dt.hour.into(),
        dt.minute.into(),
        dt.second.into(),
        dt.nanosecond.unwrap_or(0),
    )?;
    let naive = NaiveDateTime::new(date, time);

    match dt.offset {
        Some(minutes) => FixedOffset::east_opt(i32::from(minutes) * 60)?
            .from_local_datetime(&naive)
            .single()
            .map(SystemTime::from),
        // Ambiguous local times (DST fold) take the earlier instant
        None => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(SystemTime::from),
    }
}
