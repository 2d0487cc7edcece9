use std::time::Duration;

/// 固定间隔的消息重试策略
///
/// `limit` 为重投次数上限：处理器最多被调用 `limit + 1` 次，之后进入故障路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub limit: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn interval(limit: u32, interval: Duration) -> Self {
        Self { limit, interval }
    }

    pub const fn none() -> Self {
        Self {
            limit: 0,
            interval: Duration::ZERO,
        }
    }

    /// 已重投 `redelivery_count` 次后是否还允许再次投递
    pub fn should_retry(&self, redelivery_count: u32) -> bool {
        redelivery_count < self.limit
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::interval(5, Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_bounded_by_limit() {
        let policy = RetryPolicy::interval(2, Duration::from_millis(10));
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert!(!RetryPolicy::none().should_retry(0));
    }
}
