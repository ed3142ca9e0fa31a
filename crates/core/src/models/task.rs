use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{RelayError, Result};

/// 任务定义
///
/// 表示一次需要被分发到某个后端执行的自然语言任务。
///
/// # 字段说明
///
/// - `id`: 任务的唯一标识符
/// - `prompt`: 任务内容（提示词文本）
/// - `system_prompt`: 可选的系统指令覆盖
/// - `priority`: 任务优先级
/// - `status`: 任务状态，只能沿 pending → running → {completed, failed} 单向流转
/// - `parent_id`: 父任务引用，为子任务树预留，分发引擎只负责保存
/// - `metadata`: 调用方自定义的键值对，分发引擎不会修改
/// - `created_at` / `updated_at`: 创建时间与最后更新时间
///
/// # 使用示例
///
/// ```rust
/// use relay_core::models::{Task, TaskPriority, TaskStatus};
///
/// let task = Task::new("总结这篇文章")
///     .with_priority(TaskPriority::High)
///     .with_system_prompt("你是一个严谨的编辑");
///
/// assert_eq!(task.status, TaskStatus::Pending);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 任务优先级
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "normal" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            _ => Err(RelayError::Serialization(format!("无效的任务优先级: {s}"))),
        }
    }
}

/// 任务状态
///
/// ```text
/// Pending → Running → Completed
///                   ↘ Failed
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// 状态只允许向前流转
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl Task {
    /// 创建新任务
    pub fn new(prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            system_prompt: None,
            priority: TaskPriority::Normal,
            status: TaskStatus::Pending,
            parent_id: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::Pending)
    }

    /// 推进任务状态，同时刷新 `updated_at`
    pub fn transition_to(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(RelayError::InvalidTaskState {
                task_id: self.id,
                status: self.status,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<()> {
        self.transition_to(TaskStatus::Running)
    }

    pub fn mark_completed(&mut self) -> Result<()> {
        self.transition_to(TaskStatus::Completed)
    }

    pub fn mark_failed(&mut self) -> Result<()> {
        self.transition_to(TaskStatus::Failed)
    }
}
