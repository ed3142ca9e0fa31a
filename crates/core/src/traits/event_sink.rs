use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    models::{Event, EventFilter, EventId, NewEvent},
    Result,
};

/// 事件存储接口
///
/// 追加写入的审计日志。`append` 负责分配事件id和时间戳，并且必须持久化成功
/// 才能返回；任何失败都会让当前分发调用以致命错误结束。
///
/// 查询结果按时间戳升序排列，时间戳相同时按事件id升序。
#[async_trait]
pub trait EventSink: Send + Sync {
    /// 追加事件，返回分配的事件id
    async fn append(&self, event: NewEvent) -> Result<EventId>;

    /// 按条件查询事件
    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// 查询某个任务的全部事件
    async fn query_by_task(&self, task_id: Uuid) -> Result<Vec<Event>> {
        self.query(&EventFilter::for_task(task_id)).await
    }

    /// 清空事件日志，只用于测试和重置，分发引擎不会调用
    async fn clear(&self) -> Result<()>;

    /// `append` 能否被并发调用
    fn supports_concurrent_append(&self) -> bool {
        true
    }
}
