use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{config::BackendConfig, AttemptOutcome, Backend, RelayError, Result, Task};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 可用性探测的超时时间
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// 命令行后端
///
/// 每次调用启动一个本地进程：提示词写入stdin，stdout作为结果。
/// 退出码非零时视为失败，错误信息优先取stderr。
#[derive(Debug, Clone)]
pub struct CommandBackend {
    id: String,
    command: String,
    args: Vec<String>,
    probe_args: Vec<String>,
    /// 传递系统指令的参数名，为空时忽略任务的系统指令
    system_flag: Option<String>,
}

impl CommandBackend {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: Vec::new(),
            probe_args: vec!["--version".to_string()],
            system_flag: None,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let command = config
            .command
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                RelayError::config_error(format!("后端 {} 缺少 command 配置", config.id))
            })?;

        Ok(Self {
            id: config.id.clone(),
            command,
            args: config.args.clone(),
            probe_args: config.probe_args.clone(),
            system_flag: config.system_flag.clone(),
        })
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_probe_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probe_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_system_flag(mut self, flag: impl Into<String>) -> Self {
        self.system_flag = Some(flag.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn build_command(&self, task: &Task) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        if let (Some(flag), Some(system_prompt)) = (&self.system_flag, &task.system_prompt) {
            cmd.arg(flag).arg(system_prompt);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Backend for CommandBackend {
    async fn probe_availability(&self) -> bool {
        if self.probe_args.is_empty() {
            return true;
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.probe_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(PROBE_TIMEOUT, cmd.status()).await {
            Ok(Ok(status)) if status.success() => true,
            Ok(Ok(status)) => {
                debug!("后端 {} 探测失败，退出码: {:?}", self.id, status.code());
                false
            }
            Ok(Err(e)) => {
                debug!("后端 {} 探测命令无法启动: {}", self.id, e);
                false
            }
            Err(_) => {
                warn!("后端 {} 探测超时", self.id);
                false
            }
        }
    }

    async fn execute(&self, task: &Task) -> Result<AttemptOutcome> {
        let start = Instant::now();
        info!(
            "执行命令后端: backend={}, command={}, args={:?}",
            self.id, self.command, self.args
        );

        let mut child = match self.build_command(task).spawn() {
            Ok(child) => child,
            Err(e) => {
                return Ok(AttemptOutcome::failure(
                    &self.id,
                    format!("启动命令失败: {e}"),
                    start.elapsed(),
                ));
            }
        };

        let stdin = child.stdin.take();
        let prompt = task.prompt.clone();
        let write_prompt = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (written, output) = tokio::join!(write_prompt, child.wait_with_output());
        if let Err(e) = written {
            // 进程可能未读取stdin就退出，以退出码为准
            debug!("向后端 {} 写入提示词失败: {}", self.id, e);
        }

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return Ok(AttemptOutcome::failure(
                    &self.id,
                    format!("等待进程结束失败: {e}"),
                    start.elapsed(),
                ));
            }
        };

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            debug!(
                "命令后端执行成功: backend={}, duration={}ms",
                self.id,
                duration.as_millis()
            );
            Ok(AttemptOutcome::success(&self.id, stdout, duration))
        } else {
            let error = if stderr.is_empty() {
                format!("命令执行失败，退出码: {:?}", output.status.code())
            } else {
                stderr
            };
            Ok(AttemptOutcome::failure(&self.id, error, duration))
        }
    }

    fn description(&self) -> &str {
        "Local command-line LLM client"
    }
}
