//! Clock port: the engine never reads the system time directly.

use chrono::{FixedOffset, Local, NaiveDateTime, Offset, TimeZone};

use irrigo_domain::time::{self, Timestamp};

/// Source of the current instant and of the local UTC offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// UTC offset of the local timezone in force at `at`.
    fn utc_offset(&self, at: Timestamp) -> FixedOffset {
        Local.offset_from_utc_datetime(&at.naive_utc()).fix()
    }

    /// Current local wall-clock time.
    fn local_now(&self) -> NaiveDateTime {
        let now = self.now();
        time::to_local(now, self.utc_offset(now))
    }

    /// Convert a local wall-clock time to an instant.
    fn to_instant(&self, local: NaiveDateTime) -> Timestamp {
        time::to_utc(local, |at| self.utc_offset(at))
    }
}

/// Reads the operating system clock and timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        time::now()
    }
}
