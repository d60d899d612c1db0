//! Session-timing heuristic: how much liquidity the current UTC hour
//! usually carries.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Liquidity quality in [-1, 1] for a UTC timestamp. The London/NY overlap
/// scores best; the late-NY lull and weekends worst.
pub fn session_quality(timestamp: i64) -> f64 {
    let when: DateTime<Utc> = match DateTime::from_timestamp(timestamp, 0) {
        Some(t) => t,
        None => return 0.0,
    };

    if matches!(when.weekday(), Weekday::Sat | Weekday::Sun) {
        return -1.0;
    }

    match when.hour() {
        12..=16 => 1.0,  // London/NY overlap
        7..=11 => 0.5,   // London morning
        17..=19 => 0.3,  // NY afternoon
        0..=6 => -0.2,   // Asia
        _ => -0.5,       // post-NY thin hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap().timestamp()
    }

    #[test]
    fn test_overlap_beats_thin_hours() {
        // 2026-01-05 is a Monday
        let overlap = session_quality(ts(2026, 1, 5, 14));
        let late = session_quality(ts(2026, 1, 5, 21));
        let asia = session_quality(ts(2026, 1, 5, 3));

        assert_eq!(overlap, 1.0);
        assert!(overlap > asia);
        assert!(asia > late);
    }

    #[test]
    fn test_weekend_is_worst() {
        let saturday = session_quality(ts(2026, 1, 3, 14));
        assert_eq!(saturday, -1.0);
    }

    #[test]
    fn test_always_in_range() {
        for hour in 0..24 {
            let q = session_quality(ts(2026, 1, 5, hour));
            assert!((-1.0..=1.0).contains(&q));
        }
    }
}
