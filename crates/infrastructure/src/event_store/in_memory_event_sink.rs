use async_trait::async_trait;
use chrono::Utc;
use relay_core::{Event, EventFilter, EventId, EventSink, NewEvent, Result};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct EventLog {
    events: Vec<Event>,
    next_id: EventId,
}

/// 内存事件存储
///
/// 进程内的追加日志，适用于测试和一次性的命令行调用。事件id和时间戳在写锁内
/// 分配，因此并发写入时两者都保持单调。
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    log: RwLock<EventLog>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.events.is_empty()
    }

    /// 按写入顺序返回全部事件
    pub async fn snapshot(&self) -> Vec<Event> {
        self.log.read().await.events.clone()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn append(&self, event: NewEvent) -> Result<EventId> {
        let mut log = self.log.write().await;
        log.next_id += 1;
        let id = log.next_id;

        // 时间戳不早于上一条事件
        let mut timestamp = Utc::now();
        if let Some(last) = log.events.last() {
            if timestamp < last.timestamp {
                timestamp = last.timestamp;
            }
        }

        let event = event.into_event(id, timestamp);
        debug!(event_id = id, kind = %event.kind, task_id = %event.task_id, "写入内存事件");
        log.events.push(event);
        Ok(id)
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let log = self.log.read().await;
        let mut events: Vec<Event> = log
            .events
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn clear(&self) -> Result<()> {
        let mut log = self.log.write().await;
        log.events.clear();
        debug!("清空内存事件存储");
        Ok(())
    }
}
