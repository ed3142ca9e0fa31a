//! # Relay Dispatcher
//!
//! 分发引擎：按执行计划依次探测、调用、重试和回退候选后端，并把每一次状态
//! 转换写入事件存储；批量协调器在此之上提供顺序和并发两种批量执行模式。

pub mod batch;
pub mod engine;
pub mod event_recorder;
pub mod retry_policy;

pub use batch::{BatchCoordinator, BatchSummary, DispatchJob};
pub use engine::{DispatchEngine, EngineConfig};
pub use event_recorder::EventRecorder;
pub use retry_policy::RetryPolicy;
