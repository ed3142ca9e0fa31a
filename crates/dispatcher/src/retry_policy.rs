use std::time::Duration;

use relay_core::ExecutionPlan;

/// 重试策略
///
/// 同一后端内的线性退避：第 n 次尝试失败后等待 `base_delay × n`，
/// 最后一次尝试之后不等待；切换到下一个后端时也不等待。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 每个后端的最大尝试次数
    pub max_attempts: u32,
    /// 基础重试间隔
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        Self::new(plan.attempts_per_backend(), plan.base_delay)
    }

    /// 第 `try_number` 次（从1开始）失败后的等待时间，没有后续尝试时返回 `None`
    pub fn delay_after(&self, try_number: u32) -> Option<Duration> {
        if try_number == 0 || try_number >= self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(try_number))
    }
}
