use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::{ConfigValidator, ValidationUtils};
use crate::models::{BackendId, BatchMode, ExecutionPlan};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// 每个后端的最大尝试次数
    pub retry_attempts: u32,
    /// 线性退避基础间隔（毫秒）
    pub base_delay_ms: u64,
    /// 单次后端调用的超时时间（秒），不设置表示不限时
    pub call_timeout_seconds: Option<u64>,
    /// 并发模式下同时进行的分发数量上限，0 表示不限制
    pub max_concurrent_dispatches: usize,
    pub default_mode: BatchMode,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            base_delay_ms: 1000,
            call_timeout_seconds: None,
            max_concurrent_dispatches: 0,
            default_mode: BatchMode::Sequential,
        }
    }
}

impl DispatchConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_seconds.map(Duration::from_secs)
    }

    /// 用配置的重试参数为给定后端顺序构造执行计划
    pub fn plan_for<I, S>(&self, backends: I) -> ExecutionPlan
    where
        I: IntoIterator<Item = S>,
        S: Into<BackendId>,
    {
        ExecutionPlan::new(backends)
            .with_retry_attempts(self.retry_attempts)
            .with_base_delay(self.base_delay())
    }
}

impl ConfigValidator for DispatchConfig {
    fn validate(&self) -> Result<()> {
        ValidationUtils::validate_count(
            self.retry_attempts as usize,
            "dispatch.retry_attempts",
            100,
        )?;
        if let Some(timeout) = self.call_timeout_seconds {
            ValidationUtils::validate_timeout_seconds(timeout, "dispatch.call_timeout_seconds")?;
        }
        if self.max_concurrent_dispatches > 10000 {
            return Err(crate::RelayError::config_error(
                "dispatch.max_concurrent_dispatches must be less than or equal to 10000",
            ));
        }
        Ok(())
    }
}
