//! Self-describing storage file names.
//!
//! A backup of `notes.txt` taken at 2024-03-05 14:07:09.123456 UTC is stored as
//! `notes_20240305140709123456.txt.gz`. Everything a listing needs (source name and
//! creation time) is recovered from that name, so the managed root carries no index.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Extension appended to every stored snapshot
pub const COMPRESSED_EXTENSION: &str = "gz";

/// Seconds part of the storage timestamp
const SECONDS_FORMAT: &str = "%Y%m%d%H%M%S";

/// `YYYYMMDDHHMMSS` + six digits of microseconds
pub const TIMESTAMP_LEN: usize = 20;

/// Last timestamp handed out, in microseconds since the epoch
static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Source identity recovered from a storage file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStorageName {
    pub source_name: String,
    pub created_at: DateTime<Utc>,
}

/// Split a base file name at its last period.
///
/// Names whose only period is leading (`.bashrc`) have no extension and the whole
/// name is the stem. A trailing period (`name.`) gives an empty extension, which
/// keeps its storage name distinct from every other source.
pub fn split_file_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Render a timestamp as the 20 digit storage form
pub fn format_timestamp(created_at: &DateTime<Utc>) -> String {
    format!(
        "{}{:06}",
        created_at.format(SECONDS_FORMAT),
        created_at.timestamp_subsec_micros()
    )
}

/// Parse the 20 digit storage form back into a UTC timestamp
pub fn parse_timestamp(digits: &str) -> Option<DateTime<Utc>> {
    if digits.len() != TIMESTAMP_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (seconds, micros) = digits.split_at(TIMESTAMP_LEN - 6);
    let micros: u32 = micros.parse().ok()?;

    NaiveDateTime::parse_from_str(seconds, SECONDS_FORMAT)
        .ok()?
        .with_nanosecond(micros * 1_000)
        .map(|naive| naive.and_utc())
}

/// Build `<stem>_<ts>.<ext>.gz`, or `<stem>_<ts>.gz` for extensionless names.
///
/// A trailing-period source such as `name.` becomes `name_<ts>..gz`.
pub fn storage_file_name(source_name: &str, created_at: &DateTime<Utc>) -> String {
    let timestamp = format_timestamp(created_at);

    match split_file_name(source_name) {
        (stem, Some(ext)) => format!("{}_{}.{}.{}", stem, timestamp, ext, COMPRESSED_EXTENSION),
        (stem, None) => format!("{}_{}.{}", stem, timestamp, COMPRESSED_EXTENSION),
    }
}

/// Recover the source name and timestamp from a storage file name.
///
/// Returns `None` for temporary files and anything else not produced by
/// [`storage_file_name`].
pub fn parse_storage_name(file_name: &str) -> Option<ParsedStorageName> {
    let body = file_name.strip_suffix(COMPRESSED_EXTENSION)?.strip_suffix('.')?;

    let parsed = if let Some(head) = body.strip_suffix('.') {
        // `<stem>_<ts>.` comes only from a source with a trailing period
        let (stem, created_at) = split_stamped(head)?;
        ParsedStorageName {
            source_name: format!("{}.", stem),
            created_at,
        }
    } else {
        // Extensions never contain a period, so try `<stem>_<ts>.<ext>` at the last one first
        let with_extension = body
            .rsplit_once('.')
            .and_then(|(head, ext)| split_stamped(head).map(|(stem, at)| (stem, ext, at)));

        match with_extension {
            Some((stem, ext, created_at)) => ParsedStorageName {
                source_name: format!("{}.{}", stem, ext),
                created_at,
            },
            None => {
                let (stem, created_at) = split_stamped(body)?;
                ParsedStorageName {
                    source_name: stem.to_string(),
                    created_at,
                }
            }
        }
    };

    // Only names this module would have produced for the recovered source
    (storage_file_name(&parsed.source_name, &parsed.created_at) == file_name).then_some(parsed)
}

/// Split `<stem>_<ts>` into its parts
fn split_stamped(value: &str) -> Option<(&str, DateTime<Utc>)> {
    let separator = value.len().checked_sub(TIMESTAMP_LEN + 1)?;
    if !value.is_char_boundary(separator) {
        return None;
    }

    let (stem, rest) = value.split_at(separator);
    let digits = rest.strip_prefix('_')?;

    if stem.is_empty() {
        return None;
    }

    Some((stem, parse_timestamp(digits)?))
}

/// Strictly increasing UTC timestamp at microsecond resolution.
///
/// Successive calls in one process never return the same value, even when the
/// wall clock has not advanced between them.
pub fn next_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();

    let previous = LAST_TIMESTAMP_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        .unwrap_or(now);

    let stamp = now.max(previous.saturating_add(1));
    DateTime::from_timestamp_micros(stamp).unwrap_or_else(Utc::now)
}
