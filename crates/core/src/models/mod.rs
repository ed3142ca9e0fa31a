//! # 数据模型
//!
//! 分发引擎使用的核心数据结构。
//!
//! ## 核心模型
//!
//! ### Task - 任务
//! 一条需要交给后端执行的自然语言任务。分发引擎只会修改 `status` 和
//! `updated_at`，提示词与元数据保持不变。
//!
//! ### ExecutionPlan - 执行计划
//! 有序的候选后端列表以及每个后端的重试参数，由调用方持有。
//!
//! ### AttemptOutcome / DispatchResult - 执行结果
//! 单次尝试的结果，以及一次分发调用最终选定的结果和尝试总数。
//!
//! ### Event - 审计事件
//! 分发过程中每一次状态转换都会写入事件存储。
//!
//! ## 状态管理
//!
//! ```text
//! Pending → Running → Completed
//!                   ↘ Failed
//! ```

pub mod event;
pub mod outcome;
pub mod plan;
pub mod task;

pub use event::*;
pub use outcome::*;
pub use plan::*;
pub use task::*;
