use std::time::Duration;

use async_trait::async_trait;
use relay_core::{config::BackendConfig, AttemptOutcome, Backend, Task, Usage};
use tokio::time::{sleep, Instant};

/// 模拟后端
///
/// 固定延迟、固定成败，成功时返回配置的响应或回显提示词。用于演练执行计划，
/// 不发起任何外部调用。
#[derive(Debug, Clone)]
pub struct MockBackend {
    id: String,
    should_succeed: bool,
    latency: Duration,
    response: Option<String>,
    report_usage: bool,
}

impl MockBackend {
    pub fn new(id: impl Into<String>, should_succeed: bool, latency: Duration) -> Self {
        Self {
            id: id.into(),
            should_succeed,
            latency,
            response: None,
            report_usage: true,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            id: config.id.clone(),
            should_succeed: config.succeed,
            latency: Duration::from_millis(config.latency_ms),
            response: config.response.clone(),
            report_usage: true,
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn without_usage(mut self) -> Self {
        self.report_usage = false;
        self
    }

    fn render_response(&self, task: &Task) -> String {
        self.response
            .clone()
            .unwrap_or_else(|| format!("[{}] {}", self.id, task.prompt))
    }
}

/// 按空白分词粗略估计token数
fn estimate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[async_trait]
impl Backend for MockBackend {
    async fn probe_availability(&self) -> bool {
        true
    }

    async fn execute(&self, task: &Task) -> relay_core::Result<AttemptOutcome> {
        let start = Instant::now();
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        if !self.should_succeed {
            return Ok(AttemptOutcome::failure(
                &self.id,
                format!("Mock backend {} execution failed", self.id),
                start.elapsed(),
            ));
        }

        let response = self.render_response(task);
        let mut outcome = AttemptOutcome::success(&self.id, response.clone(), start.elapsed());
        if self.report_usage {
            let prompt_tokens = estimate_tokens(&task.prompt)
                + task.system_prompt.as_deref().map_or(0, estimate_tokens);
            outcome = outcome.with_usage(Usage::new(prompt_tokens, estimate_tokens(&response)));
        }
        Ok(outcome)
    }

    fn description(&self) -> &str {
        "Mock backend for dry runs"
    }
}
