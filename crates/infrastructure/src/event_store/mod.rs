//! 事件存储实现
//!
//! - [`InMemoryEventSink`] 进程内存储，进程退出即丢失
//! - [`SqliteEventSink`] SQLite持久化存储，可在多次调用之间查询审计记录

pub mod in_memory_event_sink;
pub mod sqlite_event_sink;

pub use in_memory_event_sink::InMemoryEventSink;
pub use sqlite_event_sink::SqliteEventSink;
