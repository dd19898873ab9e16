use chrono::{DateTime, Utc};

/// 两个时间点之间的秒数，倒序时记为 0
pub fn elapsed_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_seconds().max(0) as u64
}

/// 格式化时长：`45s`、`1m 35s`、`1h 2m 5s`
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_each_range() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(95), "1m 35s");
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
    }

    #[test]
    fn reversed_range_clamps_to_zero() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(elapsed_between(start, end), 0);
        assert_eq!(elapsed_between(end, start), 10);
    }
}
