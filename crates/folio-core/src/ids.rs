//! Identifier generation.
//!
//! Collection items carry human-readable, time-ordered ids of the form
//! `{prefix}{YYYYMMDD_HHMMSS_ffffff}` (for example `n_20240101_120000_000042`).
//! The microsecond part comes from a process-wide monotonic clock: each id is
//! strictly later than the one before it, even when the wall clock stalls or
//! two ids are requested within the same microsecond.
//!
//! Events use UUIDv7 via [`new_v7`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local, TimeZone, Utc};
use uuid::Uuid;

/// Id prefix for notes.
pub const NOTE_PREFIX: &str = "n_";
/// Id prefix for quotes.
pub const QUOTE_PREFIX: &str = "q_";
/// Id prefix for tasks.
pub const TASK_PREFIX: &str = "t_";
/// Id prefix for summaries.
pub const SUMMARY_PREFIX: &str = "s_";

const ID_TIME_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Next tick of the monotonic microsecond clock.
fn next_micros() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_MICROS.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Format a microsecond timestamp as an id body in local time.
fn format_micros(micros: i64) -> String {
    let utc: DateTime<Utc> = Utc
        .timestamp_micros(micros)
        .single()
        .unwrap_or_else(Utc::now);
    utc.with_timezone(&Local).format(ID_TIME_FORMAT).to_string()
}

/// Generate a prefixed, time-ordered item id.
///
/// # Example
///
/// ```
/// use folio_core::ids::{generate_id, NOTE_PREFIX};
///
/// let a = generate_id(NOTE_PREFIX);
/// let b = generate_id(NOTE_PREFIX);
/// assert!(a.starts_with("n_"));
/// assert_ne!(a, b);
/// ```
pub fn generate_id(prefix: &str) -> String {
    format!("{}{}", prefix, format_micros(next_micros()))
}

/// Generate an id that is not contained in `taken`.
///
/// The monotonic clock already prevents in-process duplicates; this guards
/// against ids loaded from documents written with a clock running ahead.
pub fn generate_unique_id<'a, I>(prefix: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    loop {
        let id = generate_id(prefix);
        if !taken.clone().into_iter().any(|t| t == id) {
            return id;
        }
    }
}
