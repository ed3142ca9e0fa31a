use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use relay_backends::BackendFactory;
use relay_core::config::AppConfig;
use relay_core::{
    BackendInfo, BackendRegistry, BatchMode, DefaultBackendRegistry, DispatchResult, Event,
    EventFilter, EventSink, ExecutionPlan, RelayError, Task, TaskPriority,
};
use relay_dispatcher::{BatchCoordinator, DispatchEngine, DispatchJob, EngineConfig};
use relay_infrastructure::EventSinkFactory;
use serde::{Deserialize, Serialize};
use tracing::info;

/// 批量文件中的一条任务
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    /// 覆盖配置中的后端顺序
    #[serde(default)]
    pub backends: Option<Vec<String>>,
}

impl TaskSpec {
    fn to_task(&self) -> Task {
        let mut task = Task::new(self.prompt.clone()).with_priority(self.priority);
        if let Some(system_prompt) = &self.system_prompt {
            task = task.with_system_prompt(system_prompt.clone());
        }
        task
    }
}

/// 批量执行中单个任务的输出
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchEntry {
    Result(DispatchResult),
    Error(String),
}

/// 读取批量任务文件：JSON数组，元素为提示词字符串或 [`TaskSpec`] 对象
pub fn load_task_specs(path: &Path) -> Result<Vec<TaskSpec>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Prompt(String),
        Spec(TaskSpec),
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取批量任务文件失败: {}", path.display()))?;
    let entries: Vec<Entry> = serde_json::from_str(&content)
        .with_context(|| format!("解析批量任务文件失败: {}", path.display()))?;

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Prompt(prompt) => TaskSpec {
                prompt,
                system_prompt: None,
                priority: TaskPriority::default(),
                backends: None,
            },
            Entry::Spec(spec) => spec,
        })
        .collect())
}

/// 命令行应用：按配置组装注册表、事件存储和分发引擎
pub struct Application {
    config: AppConfig,
    registry: Arc<DefaultBackendRegistry>,
    sink: Arc<dyn EventSink>,
    engine: Arc<DispatchEngine>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let registry = BackendFactory::build_registry(&config.backends)
            .await
            .context("创建后端注册表失败")?;
        let sink = EventSinkFactory::create(&config.storage)
            .await
            .context("创建事件存储失败")?;
        let engine = Arc::new(DispatchEngine::with_config(
            registry.clone(),
            sink.clone(),
            EngineConfig::from(&config.dispatch),
        ));

        info!(
            "应用初始化完成: {} 个后端, 存储类型 {:?}",
            config.enabled_backend_ids().len(),
            config.storage.kind
        );

        Ok(Self {
            config,
            registry,
            sink,
            engine,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 显式指定的后端顺序优先，否则使用配置中已启用的后端
    ///
    /// 显式指定了未注册（或已禁用）的后端时返回 [`RelayError::BackendNotFound`]。
    pub async fn plan(&self, backends: Option<Vec<String>>) -> relay_core::Result<ExecutionPlan> {
        let backends = match backends.filter(|b| !b.is_empty()) {
            Some(backends) => {
                for id in &backends {
                    if !self.registry.contains(id).await {
                        return Err(RelayError::BackendNotFound { id: id.clone() });
                    }
                }
                backends
            }
            None => self.config.enabled_backend_ids(),
        };
        Ok(self.config.dispatch.plan_for(backends))
    }

    pub async fn run_task(&self, task: Task, backends: Option<Vec<String>>) -> Result<DispatchResult> {
        let plan = self.plan(backends).await?;
        let result = self.engine.dispatch(task, &plan).await?;
        Ok(result)
    }

    /// 计划无法解析的任务直接记为错误，不参与分发
    pub async fn run_batch(&self, specs: Vec<TaskSpec>, mode: BatchMode) -> Vec<BatchEntry> {
        let mut entries: Vec<Option<BatchEntry>> = Vec::with_capacity(specs.len());
        let mut jobs = Vec::new();
        let mut slots = Vec::new();

        for (index, spec) in specs.iter().enumerate() {
            match self.plan(spec.backends.clone()).await {
                Ok(plan) => {
                    jobs.push(DispatchJob::new(spec.to_task(), plan));
                    slots.push(index);
                    entries.push(None);
                }
                Err(e) => entries.push(Some(BatchEntry::Error(e.to_string()))),
            }
        }

        let coordinator = BatchCoordinator::new(self.engine.clone())
            .with_max_concurrency(self.config.dispatch.max_concurrent_dispatches);
        let results = coordinator.dispatch_all(jobs, mode).await;

        for (index, result) in slots.into_iter().zip(results) {
            entries[index] = Some(match result {
                Ok(result) => BatchEntry::Result(result),
                Err(e) => BatchEntry::Error(e.to_string()),
            });
        }

        entries.into_iter().flatten().collect()
    }

    pub async fn events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        Ok(self.sink.query(filter).await?)
    }

    /// 清空事件日志，返回输出到stdout的确认信息
    pub async fn clear_events(&self) -> Result<serde_json::Value> {
        self.sink.clear().await?;
        Ok(serde_json::json!({ "cleared": true }))
    }

    pub async fn backends(&self) -> Vec<BackendInfo> {
        self.registry.get_all_backend_info().await
    }
}
