//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, FixedOffset, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get the current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given instant
    pub fn new(fixed_time: DateTime<Utc>) -> Self {
        Self { fixed_time }
    }

    /// Create a new fixed clock from a Unix timestamp in milliseconds.
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_millis(fixed_time_millis: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(fixed_time_millis).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

fn jst() -> FixedOffset {
    // JST is UTC+9
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid offset")
}

/// Render an instant in JST as RFC 3339
pub fn to_jst_rfc3339(instant: &DateTime<Utc>) -> String {
    instant.with_timezone(&jst()).to_rfc3339()
}

/// Convert Unix timestamp (milliseconds) to an UTC instant
pub fn from_millis(timestamp_millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(timestamp_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_increasing_timestamps() {
        // テスト項目: SystemClock が呼び出すたびに増加する時刻を返す
        // given (前提条件):
        let clock = SystemClock;

        // when (操作):
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = clock.now();

        // then (期待する結果):
        assert!(second >= first);
    }

    #[test]
    fn test_fixed_clock_returns_consistent_timestamp() {
        // テスト項目: FixedClock が複数回呼び出しても同じ時刻を返す
        // given (前提条件):
        let clock = FixedClock::from_millis(1_672_498_800_000);

        // when (操作):
        let first = clock.now();
        let second = clock.now();

        // then (期待する結果):
        assert_eq!(first, second);
        assert_eq!(first.timestamp_millis(), 1_672_498_800_000);
    }

    #[test]
    fn test_to_jst_rfc3339_format() {
        // テスト項目: 時刻が JST の RFC 3339 形式に変換される
        // given (前提条件):
        // 2023-01-01 00:00:00 JST
        let instant = from_millis(1_672_498_800_000).unwrap();

        // when (操作):
        let result = to_jst_rfc3339(&instant);

        // then (期待する結果):
        assert!(result.starts_with("2023-01-01T00:00:00"));
        assert!(result.contains("+09:00"));
    }

    #[test]
    fn test_from_millis_out_of_range() {
        // テスト項目: 範囲外のミリ秒は None になる
        // given (前提条件):
        let millis = i64::MAX;

        // when (操作):
        let result = from_millis(millis);

        // then (期待する結果):
        assert!(result.is_none());
    }
}
