use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan::BackendId;
use crate::errors::{RelayError, Result};

pub type EventId = i64;
pub type EventPayload = HashMap<String, serde_json::Value>;

/// 事件类型（封闭集合）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskStarted,
    BackendInvoked,
    BackendResponded,
    TaskCompleted,
    TaskFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::TaskStarted,
        EventKind::BackendInvoked,
        EventKind::BackendResponded,
        EventKind::TaskCompleted,
        EventKind::TaskFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskStarted => "task_started",
            EventKind::BackendInvoked => "backend_invoked",
            EventKind::BackendResponded => "backend_responded",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskFailed => "task_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::TaskCompleted | EventKind::TaskFailed)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('-', "_").to_lowercase();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| RelayError::Serialization(format!("无效的事件类型: {s}")))
    }
}

/// 待写入的事件，id 和时间戳由事件存储分配
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub task_id: Uuid,
    pub backend_id: Option<BackendId>,
    pub payload: EventPayload,
}

impl NewEvent {
    pub fn new(kind: EventKind, task_id: Uuid) -> Self {
        Self {
            kind,
            task_id,
            backend_id: None,
            payload: HashMap::new(),
        }
    }

    pub fn with_backend(mut self, backend_id: impl Into<BackendId>) -> Self {
        self.backend_id = Some(backend_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// 由存储层补全身份与时间戳
    pub fn into_event(self, id: EventId, timestamp: DateTime<Utc>) -> Event {
        Event {
            id,
            kind: self.kind,
            timestamp,
            task_id: self.task_id,
            backend_id: self.backend_id,
            payload: self.payload,
        }
    }
}

/// 审计事件，写入后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub task_id: Uuid,
    pub backend_id: Option<BackendId>,
    pub payload: EventPayload,
}

impl Event {
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }
}

/// 事件查询过滤器，所有条件取交集
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub task_id: Option<Uuid>,
    pub backend_id: Option<BackendId>,
}

impl EventFilter {
    pub fn for_task(task_id: Uuid) -> Self {
        Self {
            task_id: Some(task_id),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_backend(mut self, backend_id: impl Into<BackendId>) -> Self {
        self.backend_id = Some(backend_id.into());
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.kind.map_or(true, |kind| kind == event.kind)
            && self.task_id.map_or(true, |id| id == event.task_id)
            && self
                .backend_id
                .as_ref()
                .map_or(true, |backend| event.backend_id.as_ref() == Some(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(kind: EventKind, task_id: Uuid, backend: Option<&str>) -> Event {
        let mut new_event = NewEvent::new(kind, task_id);
        if let Some(backend) = backend {
            new_event = new_event.with_backend(backend);
        }
        new_event.into_event(1, Utc::now())
    }

    #[test]
    fn test_kind_roundtrip_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(
            "task-started".parse::<EventKind>().unwrap(),
            EventKind::TaskStarted
        );
        assert!("task_paused".parse::<EventKind>().is_err());
        assert!(EventKind::TaskFailed.is_terminal());
        assert!(!EventKind::BackendInvoked.is_terminal());
    }

    #[test]
    fn test_filter_matching() {
        let task_id = Uuid::new_v4();
        let event = sample_event(EventKind::BackendInvoked, task_id, Some("a"));

        assert!(EventFilter::default().matches(&event));
        assert!(EventFilter::for_task(task_id).matches(&event));
        assert!(EventFilter::for_task(task_id)
            .with_kind(EventKind::BackendInvoked)
            .with_backend("a")
            .matches(&event));

        assert!(!EventFilter::for_task(Uuid::new_v4()).matches(&event));
        assert!(!EventFilter::default()
            .with_kind(EventKind::TaskStarted)
            .matches(&event));
        assert!(!EventFilter::default().with_backend("b").matches(&event));

        let no_backend = sample_event(EventKind::TaskStarted, task_id, None);
        assert!(!EventFilter::default().with_backend("a").matches(&no_backend));
    }

    #[test]
    fn test_new_event_fields() {
        let task_id = Uuid::new_v4();
        let event = NewEvent::new(EventKind::BackendResponded, task_id)
            .with_backend("a")
            .with_field("try", 2)
            .with_field("success", false)
            .into_event(7, Utc::now());

        assert_eq!(event.id, 7);
        assert_eq!(event.field("try"), Some(&serde_json::json!(2)));
        assert_eq!(event.field("success"), Some(&serde_json::json!(false)));
        assert_eq!(event.backend_id.as_deref(), Some("a"));
    }
}
