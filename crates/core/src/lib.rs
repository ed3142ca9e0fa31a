//! # Relay Core
//!
//! 分发引擎的共享基础：数据模型、错误类型、后端与事件存储接口、后端注册表、
//! 配置和日志初始化。

pub mod backend_registry;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use backend_registry::*;
pub use errors::*;
pub use models::{
    AttemptOutcome, BackendId, BatchMode, DispatchResult, Event, EventFilter, EventId, EventKind,
    ExecutionPlan, NewEvent, Task, TaskPriority, TaskStatus, Usage,
};
pub use traits::{Backend, BackendRegistry, EventSink};
