//! 后端接口定义
//!
//! 此模块定义了分发引擎消费的后端抽象：
//! - 后端接口（可用性探测 + 执行）
//! - 后端注册表管理
//!
//! ## 核心概念
//!
//! ### Backend
//! 后端是一个可互换的远程执行提供方（通常是某个LLM服务）。分发引擎不关心
//! 具体协议，只依赖两个操作：
//! - `probe_availability` 探测后端当前是否可用，不能返回错误
//! - `execute` 执行任务，普通失败应编码为失败的 `AttemptOutcome`
//!
//! ### BackendRegistry
//! 后端注册表维护 标识 → 后端实例 的映射。分发过程中注册表对引擎是只读的，
//! 在两次分发之间增删后端由调用方自行保证顺序。
//!
//! ## 使用示例
//!
//! ```rust
//! use std::time::{Duration, Instant};
//!
//! use async_trait::async_trait;
//! use relay_core::models::{AttemptOutcome, Task};
//! use relay_core::traits::Backend;
//! use relay_core::Result;
//!
//! pub struct EchoBackend;
//!
//! #[async_trait]
//! impl Backend for EchoBackend {
//!     async fn probe_availability(&self) -> bool {
//!         true
//!     }
//!
//!     async fn execute(&self, task: &Task) -> Result<AttemptOutcome> {
//!         let start = Instant::now();
//!         Ok(AttemptOutcome::success("echo", task.prompt.clone(), start.elapsed()))
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    models::{AttemptOutcome, Task},
    Result,
};

/// 后端核心接口
///
/// # 线程安全
///
/// 此trait要求实现 `Send + Sync`，同一个后端实例可能被并发的多个分发调用共享。
///
/// # 实现要求
///
/// - `probe_availability` 必须吞掉内部错误并返回 `false`
/// - `execute` 对普通失败返回 `Ok(AttemptOutcome::failure(..))`，并且无论成败都
///   要给出耗时；返回 `Err` 或 panic 会被引擎视为一次失败的尝试
#[async_trait]
pub trait Backend: Send + Sync {
    /// 探测后端是否可用
    async fn probe_availability(&self) -> bool;

    /// 执行任务
    async fn execute(&self, task: &Task) -> Result<AttemptOutcome>;

    /// 获取后端描述
    fn description(&self) -> &str {
        "LLM backend"
    }
}

/// 后端注册表trait
#[async_trait]
pub trait BackendRegistry: Send + Sync {
    /// 注册后端，同名后端会被替换
    async fn register(&self, id: String, backend: Arc<dyn Backend>) -> Result<()>;

    /// 获取后端
    async fn get(&self, id: &str) -> Option<Arc<dyn Backend>>;

    /// 获取所有后端标识（按字典序）
    async fn list(&self) -> Vec<String>;

    /// 移除后端
    async fn unregister(&self, id: &str) -> Result<bool>;

    /// 清空所有后端
    async fn clear(&self);

    /// 检查后端是否存在
    async fn contains(&self, id: &str) -> bool;

    /// 获取后端数量
    async fn count(&self) -> usize;

    /// 探测所有后端的可用性
    async fn probe_all(&self) -> HashMap<String, bool>;
}
