//! Time/date reconciliation.
//!
//! A game record carries up to four time sources: UTCDate/UTCTime tags,
//! EndDate/EndTime tags, and numeric start/end epoch seconds. Tag times win
//! for the start; the tag end is only trusted when the Timezone tag says
//! UTC (the end tags are otherwise authored in an unknown local zone).
//! Numeric start timestamps are only meaningful for non-real-time formats
//! (daily), where the JSON start marks the actual first move.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct GameTimes {
    pub start_utc: Option<DateTime<Utc>>,
    pub end_utc: Option<DateTime<Utc>>,
    pub duration_s: Option<i64>,
}

/// Parse a tag date like `2024.01.15`, `2024-01-15` or `24/1/15`.
///
/// Two- and three-digit years are zero-padded to four. Any `?` placeholder
/// (chess.com emits `????.??.??` for unknown dates) rejects the field.
pub fn parse_tag_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains('?') {
        return None;
    }

    let parts: Vec<&str> = raw
        .split(|c| c == '.' || c == '-' || c == '/')
        .map(str::trim)
        .collect();
    if parts.len() != 3 {
        return None;
    }

    let year_raw = parts[0];
    if year_raw.is_empty() || year_raw.len() > 4 {
        return None;
    }
    let year: i32 = format!("{:0>4}", year_raw).parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a tag time like `18:02:11` (seconds optional). Hour must be in
/// 0..=23 and minute/second in 0..=59.
pub fn parse_tag_time(raw: &str) -> Option<NaiveTime> {
    let parts: Vec<&str> = raw.trim().split(':').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let second: u32 = if parts.len() == 3 {
        parts[2].parse().ok()?
    } else {
        0
    };

    NaiveTime::from_hms_opt(hour, minute, second)
}

fn tag_instant(
    tags: &HashMap<String, String>,
    date_key: &str,
    time_key: &str,
) -> Option<DateTime<Utc>> {
    let date = parse_tag_date(tags.get(date_key)?)?;
    let time = parse_tag_time(tags.get(time_key)?)?;
    Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

fn epoch_instant(epoch: Option<i64>) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch?, 0).single()
}

/// Resolve canonical UTC start/end instants and the clamped duration.
pub fn resolve_game_times(
    tags: &HashMap<String, String>,
    time_class: &str,
    start_epoch: Option<i64>,
    end_epoch: Option<i64>,
) -> GameTimes {
    let start_utc = tag_instant(tags, "UTCDate", "UTCTime").or_else(|| {
        if time_class.trim().eq_ignore_ascii_case("daily") {
            epoch_instant(start_epoch)
        } else {
            None
        }
    });

    let timezone_is_utc = tags
        .get("Timezone")
        .map(|v| v.trim().eq_ignore_ascii_case("UTC"))
        .unwrap_or(false);
    let end_utc = if timezone_is_utc {
        tag_instant(tags, "EndDate", "EndTime").or_else(|| epoch_instant(end_epoch))
    } else {
        epoch_instant(end_epoch)
    };

    let duration_s = match (start_utc, end_utc) {
        (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
        _ => None,
    };

    GameTimes {
        start_utc,
        end_utc,
        duration_s,
    }
}

/// (date, time) strings of the instant in UTC.
pub fn utc_split(instant: DateTime<Utc>) -> (String, String) {
    (
        instant.format("%Y-%m-%d").to_string(),
        instant.format("%H:%M:%S").to_string(),
    )
}

/// (date, time) strings of the instant in the display timezone.
pub fn local_split(instant: DateTime<Utc>, tz: Tz) -> (String, String) {
    let local = instant.with_timezone(&tz);
    (
        local.format("%Y-%m-%d").to_string(),
        local.format("%H:%M:%S").to_string(),
    )
}

/// Signed UTC offset of the display timezone at the given instant, in hours.
/// Fractional offsets (half- and quarter-hour zones) survive.
pub fn offset_hours(instant: DateTime<Utc>, tz: Tz) -> f64 {
    let offset = tz.offset_from_utc_datetime(&instant.naive_utc());
    f64::from(offset.fix().local_minus_utc()) / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_tag_date_variants() {
        assert_eq!(
            parse_tag_date("2024.01.15"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            parse_tag_date("2024-1-5"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        // Short years are zero-padded, not century-adjusted.
        assert_eq!(parse_tag_date("24.01.15"), NaiveDate::from_ymd_opt(24, 1, 15));
        assert_eq!(
            parse_tag_date("224/1/15"),
            NaiveDate::from_ymd_opt(224, 1, 15)
        );
        assert_eq!(parse_tag_date("????.??.??"), None);
        assert_eq!(parse_tag_date("2024.13.01"), None);
        assert_eq!(parse_tag_date("2024.01"), None);
        assert_eq!(parse_tag_date(""), None);
    }

    #[test]
    fn test_parse_tag_time_ranges() {
        assert_eq!(parse_tag_time("18:02:11"), NaiveTime::from_hms_opt(18, 2, 11));
        assert_eq!(parse_tag_time("18:02"), NaiveTime::from_hms_opt(18, 2, 0));
        assert_eq!(parse_tag_time("24:00:00"), None);
        assert_eq!(parse_tag_time("18:60:00"), None);
        assert_eq!(parse_tag_time("18:00:60"), None);
        assert_eq!(parse_tag_time("half past"), None);
    }

    #[test]
    fn test_start_prefers_tags_over_epoch() {
        let t = tags(&[("UTCDate", "2024.01.15"), ("UTCTime", "18:00:00")]);
        let resolved = resolve_game_times(&t, "blitz", Some(1_700_000_000), None);
        let (date, time) = utc_split(resolved.start_utc.unwrap());
        assert_eq!(date, "2024-01-15");
        assert_eq!(time, "18:00:00");
    }

    #[test]
    fn test_epoch_start_only_for_daily() {
        let empty = tags(&[]);
        // 2023-11-14T22:13:20Z
        let epoch = Some(1_700_000_000);

        let live = resolve_game_times(&empty, "blitz", epoch, None);
        assert!(live.start_utc.is_none());

        let daily = resolve_game_times(&empty, "daily", epoch, None);
        let (date, _) = utc_split(daily.start_utc.unwrap());
        assert_eq!(date, "2023-11-14");
    }

    #[test]
    fn test_end_tags_require_utc_timezone_tag() {
        let with_tz = tags(&[
            ("EndDate", "2024.01.15"),
            ("EndTime", "18:10:00"),
            ("Timezone", "UTC"),
        ]);
        let resolved = resolve_game_times(&with_tz, "blitz", None, Some(1_700_000_000));
        let (date, time) = utc_split(resolved.end_utc.unwrap());
        assert_eq!((date.as_str(), time.as_str()), ("2024-01-15", "18:10:00"));

        // Without the timezone tag the numeric end wins.
        let without_tz = tags(&[("EndDate", "2024.01.15"), ("EndTime", "18:10:00")]);
        let resolved = resolve_game_times(&without_tz, "blitz", None, Some(1_700_000_000));
        let (date, _) = utc_split(resolved.end_utc.unwrap());
        assert_eq!(date, "2023-11-14");
    }

    #[test]
    fn test_duration_clamped_to_zero() {
        let t = tags(&[
            ("UTCDate", "2024.01.15"),
            ("UTCTime", "18:10:00"),
            ("EndDate", "2024.01.15"),
            ("EndTime", "18:00:00"),
            ("Timezone", "UTC"),
        ]);
        let resolved = resolve_game_times(&t, "blitz", None, None);
        assert_eq!(resolved.duration_s, Some(0));

        let t = tags(&[
            ("UTCDate", "2024.01.15"),
            ("UTCTime", "18:00:00"),
            ("EndDate", "2024.01.15"),
            ("EndTime", "18:03:30"),
            ("Timezone", "UTC"),
        ]);
        let resolved = resolve_game_times(&t, "blitz", None, None);
        assert_eq!(resolved.duration_s, Some(210));
    }

    #[test]
    fn test_offset_hours_and_local_split() {
        let instant = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();

        assert_eq!(offset_hours(instant, chrono_tz::UTC), 0.0);
        assert_eq!(offset_hours(instant, chrono_tz::America::New_York), -4.0);
        assert_eq!(offset_hours(instant, chrono_tz::Asia::Kolkata), 5.5);

        let (date, time) = local_split(instant, chrono_tz::America::New_York);
        assert_eq!(date, "2024-07-01");
        assert_eq!(time, "08:00:00");

        // A UTC display zone mirrors the UTC split exactly.
        assert_eq!(local_split(instant, chrono_tz::UTC), utc_split(instant));
    }
}
