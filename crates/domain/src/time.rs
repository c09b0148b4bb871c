//! Time and timestamp helpers.
//!
//! Timestamps are stored in UTC. Schedules and the daily reset are
//! evaluated on local wall-clock time, expressed as a [`NaiveDateTime`]
//! plus a lookup of the UTC offset in force at a given instant.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, Utc};

/// UTC timestamp used for run starts, history records and timer deadlines.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Wall-clock time at `at` under `offset`.
#[must_use]
pub fn to_local(at: Timestamp, offset: FixedOffset) -> NaiveDateTime {
    at.with_timezone(&offset).naive_local()
}

/// Convert a local wall-clock time back to UTC.
///
/// `offset_at` yields the UTC offset in force at an instant. The offset is
/// resolved twice so that a wall-clock time on the other side of a DST
/// transition maps to the right instant.
#[must_use]
pub fn to_utc(local: NaiveDateTime, offset_at: impl Fn(Timestamp) -> FixedOffset) -> Timestamp {
    let guess = local.and_utc();
    let first = offset_at(guess);
    let candidate = guess - Duration::seconds(i64::from(first.local_minus_utc()));
    let second = offset_at(candidate);
    guess - Duration::seconds(i64::from(second.local_minus_utc()))
}

/// The first local midnight strictly after `local`.
#[must_use]
pub fn next_local_midnight(local: NaiveDateTime) -> NaiveDateTime {
    let date = local.date();
    date.succ_opt()
        .unwrap_or(date)
        .and_time(NaiveTime::MIN)
}
