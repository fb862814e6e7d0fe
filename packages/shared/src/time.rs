//! Time-related utilities.

use chrono::{DateTime, TimeZone, Utc};

/// Get current Unix timestamp (milliseconds, UTC)
pub fn get_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to RFC 3339 format (UTC)
///
/// Out-of-range values fall back to the Unix epoch.
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .unwrap_or_default();
    dt.to_rfc3339()
}

/// Format a race time given in hundredths of a second.
///
/// `8520` becomes `"85.20"`, `12345` becomes `"123.45"`.
pub fn format_centiseconds(centis: i64) -> String {
    let sign = if centis < 0 { "-" } else { "" };
    let abs = centis.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_timestamp_millis_returns_positive_value() {
        // テスト項目: get_timestamp_millis が正の値を返す
        // given (前提条件):

        // when (操作):
        let timestamp = get_timestamp_millis();

        // then (期待する結果):
        assert!(timestamp > 0);
    }

    #[test]
    fn test_timestamp_to_rfc3339_format() {
        // テスト項目: タイムスタンプが正しく RFC 3339 形式に変換される
        // given (前提条件):
        // 2023-01-01 00:00:00 UTC in milliseconds
        let timestamp = 1672531200000;

        // when (操作):
        let result = timestamp_to_rfc3339(timestamp);

        // then (期待する結果):
        assert!(result.starts_with("2023-01-01T00:00:00"));
        assert!(result.ends_with("+00:00"));
    }

    #[test]
    fn test_format_centiseconds() {
        // テスト項目: 1/100 秒単位のタイムが秒表記に変換される
        // given (前提条件):
        let cases = [(8520, "85.20"), (12345, "123.45"), (5, "0.05"), (-250, "-2.50")];

        for (input, expected) in cases {
            // when (操作):
            let result = format_centiseconds(input);

            // then (期待する結果):
            assert_eq!(result, expected);
        }
    }
}
