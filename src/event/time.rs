use chrono::{DateTime, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// 解析 ISO-8601 时间戳
///
/// 后端使用 `datetime.utcnow().isoformat()`，不带时区后缀，按 UTC 处理。
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T12:00:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T14:00:05+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T12:00:05"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01 12:00:05"), Some(expected));
    }

    #[test]
    fn keeps_fractional_seconds() {
        let ts = parse_timestamp("2025-03-01T12:00:05.250000").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
