//! # Relay Infrastructure
//!
//! 事件存储的具体实现以及按配置创建存储的工厂。

pub mod event_sink_factory;
pub mod event_store;

pub use event_sink_factory::EventSinkFactory;
pub use event_store::*;
