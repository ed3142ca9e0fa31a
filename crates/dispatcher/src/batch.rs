//! 批量分发
//!
//! 把多个任务交给同一个 [`DispatchEngine`]，顺序或并发执行。无论哪种模式，
//! 返回的结果都与输入一一对应、顺序一致；单个任务的致命错误不会中断其他任务。

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use relay_core::{BatchMode, DispatchResult, ExecutionPlan, Result, Task};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::engine::DispatchEngine;

/// 一个待分发的任务及其执行计划
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub task: Task,
    pub plan: ExecutionPlan,
}

impl DispatchJob {
    pub fn new(task: Task, plan: ExecutionPlan) -> Self {
        Self { task, plan }
    }
}

/// 批量分发统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 以致命错误结束的任务数
    pub errored: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[Result<DispatchResult>]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(r) if r.is_success() => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(_) => summary.errored += 1,
            }
        }
        summary
    }
}

pub struct BatchCoordinator {
    engine: Arc<DispatchEngine>,
    /// 并发模式下同时进行的分发数上限，0表示不限制
    max_concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self {
            engine,
            max_concurrency: 0,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }

    /// 所有任务共用同一个执行计划
    pub async fn dispatch_tasks(
        &self,
        tasks: Vec<Task>,
        plan: &ExecutionPlan,
        mode: BatchMode,
    ) -> Vec<Result<DispatchResult>> {
        let jobs = tasks
            .into_iter()
            .map(|task| DispatchJob::new(task, plan.clone()))
            .collect();
        self.dispatch_all(jobs, mode).await
    }

    #[instrument(skip_all, fields(jobs = jobs.len(), mode = ?mode))]
    pub async fn dispatch_all(
        &self,
        jobs: Vec<DispatchJob>,
        mode: BatchMode,
    ) -> Vec<Result<DispatchResult>> {
        let start = Instant::now();

        let mode = match mode {
            BatchMode::Concurrent if !self.engine.sink().supports_concurrent_append() => {
                warn!("事件存储不支持并发写入，批量分发退化为顺序执行");
                BatchMode::Sequential
            }
            other => other,
        };

        let results = match mode {
            BatchMode::Sequential => self.run_sequential(jobs).await,
            BatchMode::Concurrent => self.run_concurrent(jobs).await,
        };

        let summary = BatchSummary::from_results(&results);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            errored = summary.errored,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "批量分发完成"
        );

        results
    }

    async fn run_sequential(&self, jobs: Vec<DispatchJob>) -> Vec<Result<DispatchResult>> {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            results.push(self.engine.dispatch(job.task, &job.plan).await);
        }
        results
    }

    async fn run_concurrent(&self, jobs: Vec<DispatchJob>) -> Vec<Result<DispatchResult>> {
        let engine = &self.engine;
        let dispatches = jobs
            .into_iter()
            .map(|job| async move { engine.dispatch(job.task, &job.plan).await });

        if self.max_concurrency == 0 {
            futures::future::join_all(dispatches).await
        } else {
            // buffered 保持输入顺序
            stream::iter(dispatches)
                .buffered(self.max_concurrency)
                .collect()
                .await
        }
    }
}
