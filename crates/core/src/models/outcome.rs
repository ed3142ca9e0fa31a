use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::plan::{duration_ms, BackendId};
use super::task::Task;

pub const DEFAULT_FAILURE_MESSAGE: &str = "backend reported failure";
pub const ALL_BACKENDS_FAILED: &str = "All backends failed";

/// 用量统计，分发引擎不解释其含义
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// 单次尝试的结果
///
/// `result` 仅在成功时存在，`error` 仅在失败时存在。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptOutcome {
    pub backend_id: BackendId,
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub usage: Option<Usage>,
}

impl AttemptOutcome {
    pub fn success(
        backend_id: impl Into<BackendId>,
        result: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            success: true,
            result: Some(result.into()),
            error: None,
            duration,
            usage: None,
        }
    }

    pub fn failure(
        backend_id: impl Into<BackendId>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            duration,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// 强制 result/error 与 success 标志一致，并写入注册表中的后端标识
    pub fn normalize(mut self, backend_id: &str) -> Self {
        self.backend_id = backend_id.to_string();
        if self.success {
            self.error = None;
            if self.result.is_none() {
                self.result = Some(String::new());
            }
        } else {
            self.result = None;
            if self.error.is_none() {
                self.error = Some(DEFAULT_FAILURE_MESSAGE.to_string());
            }
        }
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// 一次分发调用的最终结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchResult {
    pub task: Task,
    pub outcome: AttemptOutcome,
    /// 实际执行的尝试总数，跳过的后端不计入
    pub attempts: u32,
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        self.outcome.success
    }
}
