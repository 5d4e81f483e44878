//! Derived values: ratios, uptime text and human-readable sizes

use crate::models::Size;

/// Default cache-hit / commit ratio when there has been no activity yet.
pub const HEALTHY_DEFAULT: f64 = 100.0;
/// Default bloat / index-usage ratio when there is nothing to measure.
pub const EMPTY_DEFAULT: f64 = 0.0;

/// `100 * part / total`, clamped to [0, 100] and rounded to two decimals.
///
/// Returns `default` when `total` is not positive, so callers never see a
/// division error or NaN.
pub fn percent(part: i64, total: i64, default: f64) -> f64 {
    if total <= 0 {
        return default;
    }
    let ratio = 100.0 * part.max(0) as f64 / total as f64;
    round2(ratio.clamp(0.0, 100.0))
}

/// Cache hit ratio: 100 when the database has not read a block yet.
pub fn cache_hit_ratio(hits: i64, reads: i64) -> f64 {
    percent(hits, hits.saturating_add(reads), HEALTHY_DEFAULT)
}

/// Commit ratio: 100 when no transaction has finished yet.
pub fn commit_ratio(commits: i64, rollbacks: i64) -> f64 {
    percent(commits, commits.saturating_add(rollbacks), HEALTHY_DEFAULT)
}

/// Share of dead tuples: 0 for an empty table.
pub fn bloat_ratio(live: i64, dead: i64) -> f64 {
    percent(dead, live.max(0).saturating_add(dead.max(0)), EMPTY_DEFAULT)
}

/// Share of index scans among all scans: 0 for a table never scanned.
pub fn index_usage_ratio(index_scans: i64, sequential_scans: i64) -> f64 {
    percent(
        index_scans,
        index_scans.saturating_add(sequential_scans),
        EMPTY_DEFAULT,
    )
}

/// Connection slots in use, rounded to the nearest whole percent.
pub fn connection_utilization(connections: i64, max_connections: i64) -> i64 {
    if max_connections <= 0 {
        return 0;
    }
    (100.0 * connections.max(0) as f64 / max_connections as f64).round() as i64
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render an uptime as days, hours and minutes, leaving out units that are
/// zero. Anything under a minute is "0 minutes".
pub fn format_uptime(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| plural(value, unit))
        .collect();

    if parts.is_empty() {
        "0 minutes".to_string()
    } else {
        parts.join(" ")
    }
}

fn plural(value: i64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

/// Format a byte count the way `pg_size_pretty` does: plain bytes below
/// 10 kB, then the largest unit that keeps the value under 20480, half-rounded.
pub fn pretty_size(bytes: i64) -> String {
    const LIMIT: i64 = 10 * 1024;
    const LIMIT2: i64 = LIMIT * 2 - 1;
    const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];

    if bytes.abs() < LIMIT {
        return format!("{} bytes", bytes);
    }

    // keep one extra bit for rounding
    let mut size = bytes >> 9;
    for (i, unit) in UNITS.iter().enumerate() {
        if size.abs() < LIMIT2 || i == UNITS.len() - 1 {
            return format!("{} {}", half_rounded(size), unit);
        }
        size >>= 10;
    }
    unreachable!("loop returns on the last unit")
}

fn half_rounded(x: i64) -> i64 {
    (x + if x < 0 { -1 } else { 1 }) / 2
}

pub fn size(bytes: i64) -> Size {
    Size {
        bytes,
        pretty: pretty_size(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominators_use_defaults() {
        assert_eq!(cache_hit_ratio(0, 0), 100.0);
        assert_eq!(commit_ratio(0, 0), 100.0);
        assert_eq!(bloat_ratio(0, 0), 0.0);
        assert_eq!(index_usage_ratio(0, 0), 0.0);
        assert_eq!(connection_utilization(5, 0), 0);
    }

    #[test]
    fn test_ratios_round_to_two_decimals() {
        assert_eq!(cache_hit_ratio(2, 1), 66.67);
        assert_eq!(commit_ratio(999, 1), 99.9);
        assert_eq!(bloat_ratio(2, 1), 33.33);
        assert_eq!(index_usage_ratio(1, 0), 100.0);
    }

    #[test]
    fn test_ratios_stay_in_range() {
        for (part, rest) in [(0, 1), (1, 0), (7, 3), (1, 1_000_000), (i64::MAX / 2, 1)] {
            let r = cache_hit_ratio(part, rest);
            assert!((0.0..=100.0).contains(&r), "{} out of range", r);
            assert!(!r.is_nan());
        }
    }

    #[test]
    fn test_connection_utilization_rounds() {
        assert_eq!(connection_utilization(1, 3), 33);
        assert_eq!(connection_utilization(2, 3), 67);
        assert_eq!(connection_utilization(100, 100), 100);
    }

    #[test]
    fn test_uptime_under_a_minute() {
        assert_eq!(format_uptime(45), "0 minutes");
        assert_eq!(format_uptime(0), "0 minutes");
        assert_eq!(format_uptime(-10), "0 minutes");
    }

    #[test]
    fn test_uptime_skips_zero_units() {
        let two_days_five_minutes = 2 * 86_400 + 5 * 60;
        assert_eq!(format_uptime(two_days_five_minutes), "2 days 5 minutes");
        assert_eq!(format_uptime(3_600 + 59), "1 hour");
        assert_eq!(format_uptime(86_400 + 2 * 3_600 + 60), "1 day 2 hours 1 minute");
    }

    #[test]
    fn test_pretty_size_matches_pg_size_pretty() {
        assert_eq!(pretty_size(0), "0 bytes");
        assert_eq!(pretty_size(8192), "8192 bytes");
        assert_eq!(pretty_size(10_240), "10 kB");
        assert_eq!(pretty_size(52_428_800), "50 MB");
        assert_eq!(pretty_size(1_073_741_824), "1024 MB");
        assert_eq!(pretty_size(21_474_836_480), "20 GB");
    }
}
