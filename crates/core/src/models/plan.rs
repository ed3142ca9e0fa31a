use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{RelayError, Result};

/// 后端标识
pub type BackendId = String;

/// 执行计划
///
/// 由路由组件预先计算好的有序后端列表以及重试参数。分发引擎只读取计划，
/// 不会对其重新排序或去重：重复出现的后端会在其后续位置再被尝试一次。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub backends: Vec<BackendId>,
    /// 每个后端的最大尝试次数
    pub retry_attempts: u32,
    /// 线性退避的基础间隔
    #[serde(with = "duration_ms")]
    pub base_delay: Duration,
}

impl ExecutionPlan {
    pub fn new<I, S>(backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<BackendId>,
    {
        Self {
            backends: backends.into_iter().map(Into::into).collect(),
            retry_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// 小于1的值按1处理
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn attempts_per_backend(&self) -> u32 {
        self.retry_attempts.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn first(&self) -> Option<&BackendId> {
        self.backends.first()
    }

    /// 分发引擎只校验非空，其余约束由调用方负责
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(RelayError::EmptyPlan);
        }
        Ok(())
    }
}

/// 批量分发模式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    #[default]
    Sequential,
    Concurrent,
}

impl std::str::FromStr for BatchMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(BatchMode::Sequential),
            "concurrent" => Ok(BatchMode::Concurrent),
            _ => Err(RelayError::config_error(format!("不支持的批量模式: {s}"))),
        }
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
