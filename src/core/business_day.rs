use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Canonical timezone for the "since midnight" match partitions.
///
/// Keeping this in a single constant avoids scattering zone names across the
/// store queries; dispatch operations run on Eastern time regardless of where
/// a driver currently is.
pub const BUSINESS_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Instant of the most recent Eastern midnight.
///
/// Computed once per aggregation pass and reused by every time-boxed
/// partition, so all seven status reads agree on the boundary.
pub fn start_of_business_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_date = now.with_timezone(&BUSINESS_TIMEZONE).date_naive();
    let midnight = local_date.and_time(NaiveTime::MIN);

    // US DST shifts at 02:00 local, so midnight always resolves; the
    // fallback only guards a hypothetical gap.
    BUSINESS_TIMEZONE
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| BUSINESS_TIMEZONE.from_utc_datetime(&midnight))
        .with_timezone(&Utc)
}
