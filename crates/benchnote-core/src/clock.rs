//! Process-local monotonic timestamp source.
//!
//! Comment revisions are ordered and deduplicated by their timestamp
//! strings, so two stamps emitted by the same process must never be
//! equal. Wall clocks do not guarantee that at microsecond precision
//! (two calls can land in the same microsecond, and NTP can step the
//! clock backwards), so [`Clock`] remembers the last stamp it handed
//! out and bumps forward by one microsecond whenever wall time fails to
//! advance past it.

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Timelike, Utc};
use std::sync::Mutex;

/// Monotonic wall-clock stamp source with microsecond precision.
#[derive(Debug, Default)]
pub struct Clock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit the next timestamp as an RFC 3339 UTC string with
    /// microsecond precision. Strictly greater than every stamp this
    /// clock has emitted before.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned, which requires a prior
    /// panic while holding it (nothing here panics while holding it).
    #[must_use]
    pub fn now_stamp(&self) -> String {
        #[allow(clippy::unwrap_used)]
        let mut last = self.last.lock().unwrap();
        // Truncate to the emitted precision before comparing: two calls
        // in the same microsecond differ in nanoseconds but would format
        // to the same string.
        let now = Utc::now();
        let mut now = now
            .with_nanosecond(now.nanosecond() / 1000 * 1000)
            .unwrap_or(now);
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Parse a revision timestamp. Returns `None` for malformed stamps;
/// callers skip those rather than failing a whole lookup.
#[must_use]
pub fn parse_stamp(stamp: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(stamp).ok()
}
