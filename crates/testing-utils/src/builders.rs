//! Test data builders
//!
//! Builders with sensible defaults for tasks, plans and pre-populated
//! registries.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{
    Backend, BackendRegistry, DefaultBackendRegistry, ExecutionPlan, Task, TaskPriority,
    TaskStatus,
};
use serde_json::Value;
use uuid::Uuid;

/// Builder for test [`Task`] values
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task::new("test prompt"),
        }
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.task.prompt = prompt.to_string();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: &str) -> Self {
        self.task.system_prompt = Some(system_prompt.to_string());
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.task.parent_id = Some(parent_id);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.task.metadata.insert(key.to_string(), value);
        self
    }

    /// Forces a status without going through the transition rules
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn running(self) -> Self {
        self.with_status(TaskStatus::Running)
    }

    pub fn completed(self) -> Self {
        self.with_status(TaskStatus::Completed)
    }

    pub fn build(self) -> Task {
        self.task
    }

    /// `count` pending tasks with prompts `"{prefix}-0"`, `"{prefix}-1"`, ...
    pub fn batch(prefix: &str, count: usize) -> Vec<Task> {
        (0..count)
            .map(|i| Self::new().with_prompt(&format!("{prefix}-{i}")).build())
            .collect()
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Plan over `backends` with `retry_attempts` tries each and no backoff
pub fn plan(backends: &[&str], retry_attempts: u32) -> ExecutionPlan {
    ExecutionPlan::new(backends.iter().copied())
        .with_retry_attempts(retry_attempts)
        .with_base_delay(Duration::ZERO)
}

/// Registry holding the given backends under their ids
pub async fn registry_with(
    backends: Vec<(&str, Arc<dyn Backend>)>,
) -> Arc<DefaultBackendRegistry> {
    let registry = Arc::new(DefaultBackendRegistry::new());
    for (id, backend) in backends {
        registry
            .register(id.to_string(), backend)
            .await
            .unwrap();
    }
    registry
}
