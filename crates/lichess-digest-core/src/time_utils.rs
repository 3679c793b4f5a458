//! Shared helpers for timezone-aware date arithmetic.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolves a wall-clock time in `tz` to an instant. Ambiguous times pick the
/// earlier instant; times inside a DST gap move to the first valid minute
/// after the gap.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = local;
    // Real-world gaps are at most a couple of hours.
    for _ in 0..(24 * 60) {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => return instant,
            LocalResult::None => candidate += Duration::minutes(1),
        }
    }
    tz.from_utc_datetime(&local)
}

/// Epoch milliseconds of the start of the calendar day containing `now` in `tz`.
pub fn start_of_day_ms(tz: Tz, now: DateTime<Utc>) -> i64 {
    let date = now.with_timezone(&tz).date_naive();
    resolve_local(tz, date.and_time(NaiveTime::MIN)).timestamp_millis()
}

pub fn local_datetime(tz: Tz, epoch_ms: i64) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp_millis(epoch_ms).map(|instant| instant.with_timezone(&tz))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::{America::Sao_Paulo, Europe::Kyiv};

    use super::{local_datetime, resolve_local, start_of_day_ms};

    #[test]
    fn start_of_day_uses_the_zone_calendar_day() {
        // 2024-06-01 22:30 UTC is already 2024-06-02 01:30 in Kyiv (UTC+3).
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 22, 30, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 21, 0, 0).unwrap();
        assert_eq!(start_of_day_ms(Kyiv, now), expected.timestamp_millis());
    }

    #[test]
    fn gap_times_move_past_the_transition() {
        // Kyiv springs forward 03:00 -> 04:00 on 2024-03-31.
        let local = NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(3, 30, 0)
            .unwrap();
        let resolved = resolve_local(Kyiv, local);
        assert_eq!(resolved.naive_local().to_string(), "2024-03-31 04:00:00");
    }

    #[test]
    fn midnight_gap_resolves_to_first_valid_minute() {
        // Sao Paulo skipped midnight on 2018-11-04.
        let midnight = NaiveDate::from_ymd_opt(2018, 11, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let resolved = resolve_local(Sao_Paulo, midnight);
        assert_eq!(resolved.naive_local().to_string(), "2018-11-04 01:00:00");
    }

    #[test]
    fn converts_epoch_millis_into_zone() {
        let local = local_datetime(Kyiv, 0).expect("epoch is representable");
        assert_eq!(local.format("%d.%m.%Y %H:%M").to_string(), "01.01.1970 03:00");
    }
}
