//! Week-bucket codec.
//!
//! Every event carries a `week` column computed from its start time. The
//! bucket is the coarse equality key of every range query, so the mapping
//! must be stable: it shifts the instant into local time, adds three days
//! (1 Jan 1970 was a Thursday) and floors by the length of a week. Buckets
//! therefore start on Monday 00:00 local time.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;

/// Number of seconds in one week bucket.
pub const SECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60;

/// Shift moving the epoch (a Thursday) back to the preceding Monday.
const EPOCH_MONDAY_SHIFT: i64 = 3 * 24 * 60 * 60;

/// Upper bound on how far a DST gap can push a local wall-clock time.
const MAX_GAP_STEPS: u32 = 4 * 24;

/// Week bucket of `ts`, aligned to local Monday midnight in `ts`'s zone.
#[must_use]
pub fn week_of<Z: TimeZone>(ts: &DateTime<Z>) -> i64 {
    let offset = i64::from(ts.offset().fix().local_minus_utc());
    (ts.timestamp() + offset + EPOCH_MONDAY_SHIFT).div_euclid(SECONDS_PER_WEEK)
}

/// First instant (local Monday 00:00) of `week` in `tz`.
#[must_use]
pub fn week_start(week: i64, tz: Tz) -> DateTime<Tz> {
    let seconds = week
        .saturating_mul(SECONDS_PER_WEEK)
        .saturating_sub(EPOCH_MONDAY_SHIFT);
    let naive = DateTime::from_timestamp(seconds, 0)
        .unwrap_or_default()
        .naive_utc();
    resolve_local(tz, naive)
}

/// Local midnight of `date` in `tz`.
#[must_use]
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// `date` at `hour:minute` local time in `tz`.
#[must_use]
pub fn local_time_on(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN)
        + Duration::hours(i64::from(hour))
        + Duration::minutes(i64::from(minute));
    resolve_local(tz, naive)
}

/// Map a local wall-clock time to an instant.
///
/// Ambiguous times (DST fold) resolve to the earlier instant; times inside a
/// DST gap move forward to the first valid quarter hour.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    for _ in 0..MAX_GAP_STEPS {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt;
        }
        candidate += Duration::minutes(15);
    }
    tz.from_utc_datetime(&naive)
}
