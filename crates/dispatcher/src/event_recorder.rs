use relay_core::{
    AttemptOutcome, EventId, EventKind, EventSink, ExecutionPlan, NewEvent, RelayError, Result,
    Task,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

/// 单个任务的事件写入器
///
/// 按固定顺序写出分发生命周期事件：
///
/// ```text
/// task_started
///   (backend_invoked → backend_responded)*
/// task_completed | task_failed
/// ```
///
/// 任何写入失败都会被统一转换为 [`RelayError::Sink`]。
pub struct EventRecorder<'a> {
    sink: &'a dyn EventSink,
    task_id: Uuid,
}

impl<'a> EventRecorder<'a> {
    pub fn new(sink: &'a dyn EventSink, task_id: Uuid) -> Self {
        Self { sink, task_id }
    }

    pub async fn task_started(&self, task: &Task, plan: &ExecutionPlan) -> Result<EventId> {
        let event = NewEvent::new(EventKind::TaskStarted, self.task_id)
            .with_field("prompt", task.prompt.clone())
            .with_field("system_prompt", json!(task.system_prompt))
            .with_field("priority", task.priority.as_str())
            .with_field("backends", json!(plan.backends))
            .with_field("retry_attempts", plan.attempts_per_backend())
            .with_field("base_delay_ms", plan.base_delay.as_millis() as u64);
        self.append(event).await
    }

    pub async fn backend_invoked(
        &self,
        backend_id: &str,
        try_number: u32,
        attempt: u32,
    ) -> Result<EventId> {
        let event = NewEvent::new(EventKind::BackendInvoked, self.task_id)
            .with_backend(backend_id)
            .with_field("try", try_number)
            .with_field("attempt", attempt);
        self.append(event).await
    }

    pub async fn backend_responded(
        &self,
        outcome: &AttemptOutcome,
        try_number: u32,
    ) -> Result<EventId> {
        let mut event = NewEvent::new(EventKind::BackendResponded, self.task_id)
            .with_backend(outcome.backend_id.clone())
            .with_field("try", try_number)
            .with_field("success", outcome.success)
            .with_field("duration_ms", outcome.duration_ms())
            .with_field("usage", json!(outcome.usage));
        if let Some(error) = &outcome.error {
            event = event.with_field("error", error.clone());
        }
        self.append(event).await
    }

    pub async fn task_completed(&self, outcome: &AttemptOutcome, attempts: u32) -> Result<EventId> {
        let event = NewEvent::new(EventKind::TaskCompleted, self.task_id)
            .with_backend(outcome.backend_id.clone())
            .with_field("backend_id", outcome.backend_id.clone())
            .with_field("attempts", attempts)
            .with_field("result", json!(outcome.result))
            .with_field("usage", json!(outcome.usage));
        self.append(event).await
    }

    pub async fn task_failed(&self, error: &str, attempts: u32) -> Result<EventId> {
        let event = NewEvent::new(EventKind::TaskFailed, self.task_id)
            .with_field("error", error)
            .with_field("attempts", attempts);
        self.append(event).await
    }

    async fn append(&self, event: NewEvent) -> Result<EventId> {
        let kind = event.kind;
        self.sink.append(event).await.map_err(|e| {
            error!(task_id = %self.task_id, kind = %kind, "写入事件失败: {e}");
            match e {
                RelayError::Sink(_) => e,
                other => RelayError::sink_error(other.to_string()),
            }
        })
    }
}
