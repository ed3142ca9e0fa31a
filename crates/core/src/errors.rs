use thiserror::Error;
use uuid::Uuid;

use crate::models::TaskStatus;

/// 分发引擎错误类型定义
///
/// 后端调用层面的失败（不可用、执行失败、超时、panic）永远不会以错误形式
/// 离开分发引擎，而是被编码进 `DispatchResult`。只有计划错误、任务状态错误
/// 和事件存储错误会作为硬错误返回给调用方。
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("执行计划为空: 至少需要一个后端")]
    EmptyPlan,

    #[error("任务 {task_id} 当前状态为 {status:?}，无法开始分发")]
    InvalidTaskState { task_id: Uuid, status: TaskStatus },

    #[error("事件存储错误: {0}")]
    Sink(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("后端未找到: {id}")]
    BackendNotFound { id: String },

    #[error("后端调用错误: {0}")]
    Backend(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn sink_error<S: Into<String>>(msg: S) -> Self {
        Self::Sink(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn backend_error<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    /// 是否会中止整个分发调用
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyPlan | Self::InvalidTaskState { .. } | Self::Sink(_) | Self::Database(_)
        )
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, RelayError>;
