use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{
    config::StorageConfig, Event, EventFilter, EventId, EventKind, EventSink, NewEvent,
    RelayError, Result,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

/// SQLite事件存储
///
/// 事件写入 `events` 表，`append` 在插入提交后才返回。时间戳以微秒整数保存，
/// 且不小于表中已有的最大时间戳，系统时钟回拨时也保持单调；
/// 查询按 `(timestamp_us, id)` 升序返回。
pub struct SqliteEventSink {
    pool: SqlitePool,
}

impl SqliteEventSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 连接数据库并初始化表结构，数据库文件不存在时自动创建
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        debug!("连接SQLite事件存储: {}", config.url);

        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal);

        let mut pool_options = SqlitePoolOptions::new().min_connections(1);
        if is_memory_url(&config.url) {
            // 内存数据库随连接销毁，只保留一个常驻连接
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            pool_options = pool_options.max_connections(config.max_connections.max(1));
        }

        let pool = pool_options.connect_with(connect_options).await?;

        let sink = Self::new(pool);
        sink.run_migrations().await?;

        info!("SQLite事件存储已就绪: {}", config.url);
        Ok(sink)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect(&StorageConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                timestamp_us INTEGER NOT NULL,
                task_id TEXT NOT NULL,
                backend_id TEXT,
                payload TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_task_id ON events(task_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp_us, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_event(row: &SqliteRow) -> Result<Event> {
        let kind: String = row.try_get("kind")?;
        let timestamp_us: i64 = row.try_get("timestamp_us")?;
        let task_id: String = row.try_get("task_id")?;
        let payload: String = row.try_get("payload")?;

        let timestamp = DateTime::<Utc>::from_timestamp_micros(timestamp_us).ok_or_else(|| {
            RelayError::Serialization(format!("无效的事件时间戳: {timestamp_us}"))
        })?;
        let task_id = Uuid::parse_str(&task_id)
            .map_err(|e| RelayError::Serialization(format!("解析任务id失败: {e}")))?;

        Ok(Event {
            id: row.try_get("id")?,
            kind: EventKind::from_str(&kind)?,
            timestamp,
            task_id,
            backend_id: row.try_get("backend_id")?,
            payload: serde_json::from_str(&payload)?,
        })
    }
}

/// `sqlite::memory:` 以及 `?mode=memory` 形式的内存数据库
fn is_memory_url(url: &str) -> bool {
    if url.contains(":memory:") {
        return true;
    }
    url.split_once('?').is_some_and(|(_, params)| {
        params.split('&').any(|param| param == "mode=memory")
    })
}

#[async_trait]
impl EventSink for SqliteEventSink {
    async fn append(&self, event: NewEvent) -> Result<EventId> {
        let payload = serde_json::to_string(&event.payload)?;
        let timestamp_us = Utc::now().timestamp_micros();

        let result = sqlx::query(
            r#"
            INSERT INTO events (kind, timestamp_us, task_id, backend_id, payload)
            VALUES (
                $1,
                MAX($2, COALESCE((SELECT MAX(timestamp_us) FROM events), 0)),
                $3,
                $4,
                $5
            )
            "#,
        )
        .bind(event.kind.as_str())
        .bind(timestamp_us)
        .bind(event.task_id.to_string())
        .bind(event.backend_id.as_deref())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(event_id = id, kind = %event.kind, task_id = %event.task_id, "写入事件");
        Ok(id)
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, kind, timestamp_us, task_id, backend_id, payload FROM events WHERE 1 = 1",
        );

        if let Some(kind) = filter.kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(task_id) = filter.task_id {
            builder.push(" AND task_id = ").push_bind(task_id.to_string());
        }
        if let Some(backend_id) = &filter.backend_id {
            builder.push(" AND backend_id = ").push_bind(backend_id.clone());
        }
        builder.push(" ORDER BY timestamp_us ASC, id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn clear(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM events")
            .execute(&self.pool)
            .await?;
        info!("清空事件存储: 删除 {} 条事件", result.rows_affected());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_append_and_query_roundtrip() {
        let sink = SqliteEventSink::in_memory().await.unwrap();
        let task_id = Uuid::new_v4();

        let id = sink
            .append(
                NewEvent::new(EventKind::BackendResponded, task_id)
                    .with_backend("claude")
                    .with_field("success", false)
                    .with_field("error", "rate limited"),
            )
            .await
            .unwrap();

        let events = sink.query_by_task(task_id).await.unwrap();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.id, id);
        assert_eq!(event.kind, EventKind::BackendResponded);
        assert_eq!(event.backend_id.as_deref(), Some("claude"));
        assert_eq!(event.field("success"), Some(&json!(false)));
        assert_eq!(event.field("error"), Some(&json!("rate limited")));
    }

    #[tokio::test]
    async fn test_query_with_filters() {
        let sink = SqliteEventSink::in_memory().await.unwrap();
        let task_a = Uuid::new_v4();
        let task_b = Uuid::new_v4();

        sink.append(NewEvent::new(EventKind::TaskStarted, task_a))
            .await
            .unwrap();
        sink.append(NewEvent::new(EventKind::BackendInvoked, task_a).with_backend("gemini"))
            .await
            .unwrap();
        sink.append(NewEvent::new(EventKind::TaskStarted, task_b))
            .await
            .unwrap();

        let started = sink
            .query(&EventFilter::default().with_kind(EventKind::TaskStarted))
            .await
            .unwrap();
        assert_eq!(started.len(), 2);

        let gemini = sink
            .query(&EventFilter::for_task(task_a).with_backend("gemini"))
            .await
            .unwrap();
        assert_eq!(gemini.len(), 1);
        assert_eq!(gemini[0].kind, EventKind::BackendInvoked);

        let all = sink.query(&EventFilter::default()).await.unwrap();
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_clear() {
        let sink = SqliteEventSink::in_memory().await.unwrap();
        let task_id = Uuid::new_v4();
        sink.append(NewEvent::new(EventKind::TaskStarted, task_id))
            .await
            .unwrap();

        sink.clear().await.unwrap();
        assert!(sink.query_by_task(task_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_survives_clock_step_back() {
        let sink = SqliteEventSink::in_memory().await.unwrap();
        let task_id = Uuid::new_v4();

        let started = sink
            .append(NewEvent::new(EventKind::TaskStarted, task_id))
            .await
            .unwrap();
        // 时钟回拨一小时后写入的事件
        sqlx::query("UPDATE events SET timestamp_us = timestamp_us + 3600000000 WHERE id = $1")
            .bind(started)
            .execute(sink.pool())
            .await
            .unwrap();
        sink.append(NewEvent::new(EventKind::BackendInvoked, task_id).with_backend("a"))
            .await
            .unwrap();

        let events = sink.query_by_task(task_id).await.unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::TaskStarted, EventKind::BackendInvoked]);
        assert!(events[1].timestamp >= events[0].timestamp);
    }

    #[test]
    fn test_memory_url_detection() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://relay-events?mode=memory"));
        assert!(is_memory_url("sqlite://relay-events?cache=shared&mode=memory"));
        assert!(!is_memory_url("sqlite://relay-events.db"));
        assert!(!is_memory_url("sqlite://relay-events.db?mode=rwc"));
    }

    #[tokio::test]
    async fn test_mode_memory_url_keeps_schema() {
        let sink = SqliteEventSink::connect(&StorageConfig {
            url: "sqlite://relay-mode-memory-test?mode=memory".to_string(),
            max_connections: 4,
            ..Default::default()
        })
        .await
        .unwrap();

        let task_id = Uuid::new_v4();
        for _ in 0..4 {
            sink.append(NewEvent::new(EventKind::TaskStarted, task_id))
                .await
                .unwrap();
        }
        assert_eq!(sink.query_by_task(task_id).await.unwrap().len(), 4);
        assert_eq!(sink.pool().size(), 1);
    }

    #[tokio::test]
    async fn test_append_after_close_fails() {
        let sink = SqliteEventSink::in_memory().await.unwrap();
        sink.close().await;

        let err = sink
            .append(NewEvent::new(EventKind::TaskStarted, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Database(_)));
    }
}
