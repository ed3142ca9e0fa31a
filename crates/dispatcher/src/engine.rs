//! 分发引擎
//!
//! 给定任务和执行计划，按计划顺序驱动 可用性探测 → 尝试 → 重试 → 回退 的
//! 完整流程，在每一次状态转换时写入事件，最终返回唯一的结果和尝试总数。
//!
//! ## 流程
//!
//! ```text
//! validate plan ─▶ task_started
//!      │
//!      ▼
//! for backend in plan:
//!      ├─ 未注册 / 不可用 ─▶ 跳过（不计尝试，不写事件）
//!      └─ for try in 1..=R:
//!             backend_invoked ─▶ execute ─▶ backend_responded
//!             ├─ 成功 ─▶ task_completed ─▶ 返回
//!             └─ 失败 ─▶ sleep(base × try)（最后一次除外）
//!      │
//!      ▼
//! task_failed ─▶ 返回失败结果
//! ```
//!
//! 后端层面的失败（返回失败结果、返回错误、panic、超时）全部在本地消化；
//! 只有空计划、任务状态错误和事件存储错误会作为 `Err` 返回。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use relay_core::{
    models::ALL_BACKENDS_FAILED, AttemptOutcome, Backend, BackendRegistry, DispatchResult,
    EventSink, ExecutionPlan, RelayError, Result, Task,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::event_recorder::EventRecorder;
use crate::retry_policy::RetryPolicy;

/// 分发引擎配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// 单次后端调用的超时时间：执行超时按一次失败的尝试处理，探测超时视为不可用
    pub call_timeout: Option<Duration>,
}

impl From<&relay_core::config::DispatchConfig> for EngineConfig {
    fn from(config: &relay_core::config::DispatchConfig) -> Self {
        Self {
            call_timeout: config.call_timeout(),
        }
    }
}

pub struct DispatchEngine {
    registry: Arc<dyn BackendRegistry>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl DispatchEngine {
    pub fn new(registry: Arc<dyn BackendRegistry>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(registry, sink, EngineConfig::default())
    }

    pub fn with_config(
        registry: Arc<dyn BackendRegistry>,
        sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            config,
        }
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn registry(&self) -> &Arc<dyn BackendRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 分发单个任务
    ///
    /// 任务必须处于 `Pending` 状态；返回的结果中包含已更新状态的任务。
    #[instrument(skip_all, fields(task_id = %task.id, backends = plan.backends.len()))]
    pub async fn dispatch(&self, mut task: Task, plan: &ExecutionPlan) -> Result<DispatchResult> {
        plan.validate()?;
        if !task.is_pending() {
            return Err(RelayError::InvalidTaskState {
                task_id: task.id,
                status: task.status,
            });
        }

        let recorder = EventRecorder::new(self.sink.as_ref(), task.id);
        let retry = RetryPolicy::from_plan(plan);

        task.mark_running()?;
        recorder.task_started(&task, plan).await?;
        info!(
            "开始分发任务: 候选后端 {:?}, 每个后端最多尝试 {} 次",
            plan.backends, retry.max_attempts
        );

        let mut attempts: u32 = 0;
        let mut last_error: Option<String> = None;

        for backend_id in &plan.backends {
            let Some(backend) = self.registry.get(backend_id).await else {
                warn!("后端 {} 未注册，跳过", backend_id);
                record_skip(backend_id, "unregistered");
                continue;
            };

            if !probe(backend.as_ref(), self.config.call_timeout).await {
                warn!("后端 {} 不可用，跳过", backend_id);
                record_skip(backend_id, "unavailable");
                continue;
            }

            for try_number in 1..=retry.max_attempts {
                attempts += 1;
                recorder
                    .backend_invoked(backend_id, try_number, attempts)
                    .await?;

                let outcome = self.call_backend(backend_id, backend.as_ref(), &task).await;
                recorder.backend_responded(&outcome, try_number).await?;
                record_attempt(&outcome);

                if outcome.success {
                    task.mark_completed()?;
                    recorder.task_completed(&outcome, attempts).await?;
                    metrics::counter!("relay_dispatch_total", "outcome" => "completed").increment(1);
                    info!(
                        "任务完成: 后端 {}, 第 {} 次尝试, 共 {} 次尝试, 耗时 {}ms",
                        backend_id,
                        try_number,
                        attempts,
                        outcome.duration_ms()
                    );
                    return Ok(DispatchResult {
                        task,
                        outcome,
                        attempts,
                    });
                }

                let error = outcome.error.clone().unwrap_or_default();
                warn!(
                    "后端 {} 第 {}/{} 次尝试失败: {}",
                    backend_id, try_number, retry.max_attempts, error
                );
                last_error = Some(error);

                if let Some(delay) = retry.delay_after(try_number) {
                    if !delay.is_zero() {
                        debug!("{}ms 后重试后端 {}", delay.as_millis(), backend_id);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| ALL_BACKENDS_FAILED.to_string());
        task.mark_failed()?;
        recorder.task_failed(&error, attempts).await?;
        metrics::counter!("relay_dispatch_total", "outcome" => "failed").increment(1);
        warn!("所有后端均失败: 共 {} 次尝试, 最后错误: {}", attempts, error);

        // 失败结果归属于计划中的首选后端
        let backend_id = plan.first().cloned().unwrap_or_default();
        Ok(DispatchResult {
            task,
            outcome: AttemptOutcome::failure(backend_id, error, Duration::ZERO),
            attempts,
        })
    }

    /// 执行一次后端调用，所有异常情况都折叠为失败结果
    async fn call_backend(
        &self,
        backend_id: &str,
        backend: &dyn Backend,
        task: &Task,
    ) -> AttemptOutcome {
        let start = Instant::now();
        let call = AssertUnwindSafe(backend.execute(task)).catch_unwind();

        let result = match self.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    return AttemptOutcome::failure(
                        backend_id,
                        format!("backend call timed out after {}ms", limit.as_millis()),
                        start.elapsed(),
                    );
                }
            },
            None => call.await,
        };

        match result {
            Ok(Ok(outcome)) => outcome.normalize(backend_id),
            Ok(Err(e)) => AttemptOutcome::failure(backend_id, e.to_string(), start.elapsed()),
            Err(panic) => AttemptOutcome::failure(
                backend_id,
                format!("backend panicked: {}", panic_message(panic.as_ref())),
                start.elapsed(),
            ),
        }
    }
}

/// 探测失败（包括panic和超时）一律视为不可用
async fn probe(backend: &dyn Backend, limit: Option<Duration>) -> bool {
    let probe = AssertUnwindSafe(backend.probe_availability()).catch_unwind();
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, probe).await {
            Ok(result) => result,
            Err(_) => {
                debug!("可用性探测超时: {}ms", limit.as_millis());
                return false;
            }
        },
        None => probe.await,
    };
    result.unwrap_or(false)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn record_skip(backend_id: &str, reason: &'static str) {
    metrics::counter!(
        "relay_backend_skipped_total",
        "backend" => backend_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

fn record_attempt(outcome: &AttemptOutcome) {
    metrics::counter!(
        "relay_backend_attempts_total",
        "backend" => outcome.backend_id.clone(),
        "success" => if outcome.success { "true" } else { "false" }
    )
    .increment(1);
    metrics::histogram!(
        "relay_backend_call_duration_ms",
        "backend" => outcome.backend_id.clone()
    )
    .record(outcome.duration_ms() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_engine_config_from_dispatch_config() {
        let dispatch = relay_core::config::DispatchConfig {
            call_timeout_seconds: Some(30),
            ..Default::default()
        };
        let config = EngineConfig::from(&dispatch);
        assert_eq!(config.call_timeout, Some(Duration::from_secs(30)));
        assert_eq!(EngineConfig::default().call_timeout, None);
    }
}
