use std::sync::Arc;

use relay_core::config::{StorageConfig, StorageKind};
use relay_core::{EventSink, Result};
use tracing::{debug, info};

use crate::event_store::{InMemoryEventSink, SqliteEventSink};

pub struct EventSinkFactory;

impl EventSinkFactory {
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn EventSink>> {
        debug!("Creating event sink with kind: {:?}", config.kind);

        match config.kind {
            StorageKind::Memory => {
                info!("使用内存事件存储");
                Ok(Arc::new(InMemoryEventSink::new()))
            }
            StorageKind::Sqlite => {
                info!("使用SQLite事件存储: {}", config.url);
                let sink = SqliteEventSink::connect(config).await?;
                Ok(Arc::new(sink))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_core::{EventKind, NewEvent};
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_create_memory_sink() {
        let sink = EventSinkFactory::create(&StorageConfig::memory())
            .await
            .unwrap();
        let task_id = Uuid::new_v4();
        sink.append(NewEvent::new(EventKind::TaskStarted, task_id))
            .await
            .unwrap();
        assert_eq!(sink.query_by_task(task_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_sqlite_sink() {
        let config = StorageConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let sink = EventSinkFactory::create(&config).await.unwrap();
        assert!(sink.supports_concurrent_append());
        assert!(sink
            .query(&Default::default())
            .await
            .unwrap()
            .is_empty());
    }
}
