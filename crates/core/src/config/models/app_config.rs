use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    backends::BackendConfig, dispatch::DispatchConfig, logging::LoggingConfig,
    storage::StorageConfig,
};
use crate::config::validation::ConfigValidator;
use crate::{RelayError, Result};

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/relay.toml", "relay.toml"];
pub const ENV_PREFIX: &str = "RELAY";

/// 应用配置
///
/// 启动时构造一次，显式传递给需要的组件，核心库内部不读取任何全局环境。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub dispatch: DispatchConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub backends: Vec<BackendConfig>,
}

impl AppConfig {
    /// 加载配置
    ///
    /// 优先级：显式路径 → 默认路径 → 内置默认值，最后叠加 `RELAY_` 前缀的
    /// 环境变量（层级分隔符为 `__`，例如 `RELAY_DISPATCH__RETRY_ATTEMPTS=3`）。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(RelayError::config_error(format!("配置文件不存在: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str)
            .map_err(|e| RelayError::config_error(format!("解析TOML配置失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RelayError::Serialization(format!("序列化配置为TOML失败: {e}")))
    }

    /// 已启用后端的标识，按配置顺序排列，作为默认的执行计划顺序
    pub fn enabled_backend_ids(&self) -> Vec<String> {
        self.backends
            .iter()
            .filter(|backend| backend.enabled)
            .map(|backend| backend.id.clone())
            .collect()
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        self.backends.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::models::{BackendKind, LogFormat, StorageKind};
    use crate::models::BatchMode;

    const SAMPLE: &str = r#"
[dispatch]
retry_attempts = 3
base_delay_ms = 100
call_timeout_seconds = 60
default_mode = "concurrent"

[storage]
kind = "memory"

[logging]
level = "debug"
format = "json"

[[backends]]
id = "claude"
command = "claude"
args = ["-p"]

[[backends]]
id = "dry-run"
kind = "mock"
latency_ms = 5
enabled = false
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.backends.is_empty());
        assert_eq!(config.storage.kind, StorageKind::Sqlite);
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.dispatch.retry_attempts, 3);
        assert_eq!(config.dispatch.base_delay_ms, 100);
        assert_eq!(config.dispatch.call_timeout_seconds, Some(60));
        assert_eq!(config.dispatch.default_mode, BatchMode::Concurrent);
        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.logging.format, LogFormat::Json);

        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].kind, BackendKind::Command);
        assert_eq!(config.backends[0].probe_args, vec!["--version".to_string()]);
        assert_eq!(config.backends[1].kind, BackendKind::Mock);
        assert_eq!(config.enabled_backend_ids(), vec!["claude".to_string()]);
    }

    #[test]
    fn test_from_toml_rejects_invalid() {
        let invalid = "[dispatch]\nretry_attempts = 0\n";
        assert!(AppConfig::from_toml(invalid).is_err());

        let bad_kind = "[storage]\nkind = \"postgres\"\n";
        assert!(AppConfig::from_toml(bad_kind).is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let dumped = config.to_toml().unwrap();
        let reloaded = AppConfig::from_toml(&dumped).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        std::env::set_var("RELAY_DISPATCH__BASE_DELAY_MS", "250");
        let config = AppConfig::load(Some(&path));
        std::env::remove_var("RELAY_DISPATCH__BASE_DELAY_MS");

        let config = config.unwrap();
        assert_eq!(config.dispatch.retry_attempts, 3);
        assert_eq!(config.dispatch.base_delay_ms, 250);
        assert_eq!(config.backends.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Some("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
    }
}
