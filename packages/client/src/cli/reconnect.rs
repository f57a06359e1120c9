//! Reconnection decisions for the terminal client.
//!
//! Pure functions over the error and attempt count, kept free of side effects
//! so the runner loop stays thin.

use std::time::Duration;

use crate::error::ClientError;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Capped exponential backoff between chat reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt `attempt` (0-indexed).
    ///
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Check if the client should attempt to reconnect.
    ///
    /// # Arguments
    ///
    /// * `error` - The error that ended the room session
    /// * `current_attempt` - Reconnect attempts made so far (0-indexed)
    ///
    /// # Returns
    ///
    /// `true` if reconnection should be attempted, `false` otherwise
    pub fn should_attempt_reconnect(&self, error: &ClientError, current_attempt: u32) -> bool {
        if should_exit_immediately(error) {
            return false;
        }
        current_attempt < self.max_attempts
    }
}

/// `true` for errors a reconnect cannot fix (the session is gone)
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::NotAuthenticated(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_lost() -> ClientError {
        ClientError::ConnectionError("network error".to_string())
    }

    #[test]
    fn test_should_exit_immediately_when_not_authenticated() {
        // テスト項目: セッション切れの場合、即座に終了すべきと判定される
        // given (前提条件):
        let error = ClientError::NotAuthenticated("refresh failed".to_string());

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(result);
        assert!(!ReconnectPolicy::default().should_attempt_reconnect(&error, 0));
    }

    #[test]
    fn test_should_exit_immediately_with_connection_error() {
        // テスト項目: ConnectionError の場合、即座に終了すべきではないと判定される
        // given (前提条件):
        let error = connection_lost();

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_within_limit() {
        // テスト項目: 再接続回数が上限未満の場合のみ再接続すべきと判定される
        // given (前提条件):
        let policy = ReconnectPolicy::default();
        let error = connection_lost();

        // when (操作) / then (期待する結果):
        assert!(policy.should_attempt_reconnect(&error, 0));
        assert!(policy.should_attempt_reconnect(&error, 4));
        assert!(!policy.should_attempt_reconnect(&error, 5));
    }

    #[test]
    fn test_disabled_policy_never_reconnects() {
        // テスト項目: 無効化したポリシーでは初回から再接続しない
        // given (前提条件):
        let policy = ReconnectPolicy::disabled();

        // when (操作):
        let result = policy.should_attempt_reconnect(&connection_lost(), 0);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        // テスト項目: 待機時間は倍々に伸び、上限で頭打ちになる
        // given (前提条件):
        let policy = ReconnectPolicy::default();

        // when (操作):
        let delays: Vec<u64> = (0..7).map(|n| policy.delay_for(n).as_secs()).collect();

        // then (期待する結果):
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }
}
