use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::validation::{ConfigValidator, ValidationUtils};
use crate::{RelayError, Result};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 通过本地命令行程序调用
    #[default]
    Command,
    /// 固定延迟、固定结果的模拟后端
    Mock,
}

/// 单个后端实例的配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub id: String,
    pub kind: BackendKind,
    pub enabled: bool,

    // command
    pub command: Option<String>,
    pub args: Vec<String>,
    pub probe_args: Vec<String>,
    /// 传递系统指令时使用的参数名，例如 `--system-prompt`
    pub system_flag: Option<String>,

    // mock
    pub latency_ms: u64,
    pub succeed: bool,
    pub response: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: BackendKind::Command,
            enabled: true,
            command: None,
            args: Vec::new(),
            probe_args: vec!["--version".to_string()],
            system_flag: None,
            latency_ms: 0,
            succeed: true,
            response: None,
        }
    }
}

impl BackendConfig {
    pub fn command(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BackendKind::Command,
            command: Some(command.into()),
            ..Default::default()
        }
    }

    pub fn mock(id: impl Into<String>, succeed: bool, latency_ms: u64) -> Self {
        Self {
            id: id.into(),
            kind: BackendKind::Mock,
            succeed,
            latency_ms,
            probe_args: Vec::new(),
            ..Default::default()
        }
    }
}

impl ConfigValidator for BackendConfig {
    fn validate(&self) -> Result<()> {
        ValidationUtils::validate_not_empty(&self.id, "backends.id")?;
        if self.kind == BackendKind::Command {
            let command = self.command.as_deref().unwrap_or_default();
            ValidationUtils::validate_not_empty(command, &format!("backends.{}.command", self.id))?;
        }
        Ok(())
    }
}

impl ConfigValidator for Vec<BackendConfig> {
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for backend in self {
            backend.validate()?;
            if !seen.insert(backend.id.as_str()) {
                return Err(RelayError::config_error(format!(
                    "Duplicate backend id: {}",
                    backend.id
                )));
            }
        }
        Ok(())
    }
}
