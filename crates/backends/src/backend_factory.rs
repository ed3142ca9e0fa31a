use std::sync::Arc;

use relay_core::config::{BackendConfig, BackendKind};
use relay_core::{Backend, BackendRegistry, DefaultBackendRegistry, Result};
use tracing::{debug, info};

use crate::command::CommandBackend;
use crate::mock::MockBackend;

/// 根据 `[[backends]]` 配置创建后端实例
pub struct BackendFactory;

impl BackendFactory {
    pub fn create(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
        match config.kind {
            BackendKind::Command => {
                let backend = CommandBackend::from_config(config)?;
                info!("Created command backend: {}", config.id);
                Ok(Arc::new(backend))
            }
            BackendKind::Mock => {
                info!(
                    "Created mock backend: {} (success={}, latency={}ms)",
                    config.id, config.succeed, config.latency_ms
                );
                Ok(Arc::new(MockBackend::from_config(config)))
            }
        }
    }

    /// 构建注册表，只注册已启用的后端
    pub async fn build_registry(configs: &[BackendConfig]) -> Result<Arc<DefaultBackendRegistry>> {
        let registry = Arc::new(DefaultBackendRegistry::new());

        for config in configs {
            if !config.enabled {
                debug!("Skipping disabled backend: {}", config.id);
                continue;
            }
            let backend = Self::create(config)?;
            registry.register(config.id.clone(), backend).await?;
        }

        info!("Backend registry initialized with {} backends", registry.count().await);
        Ok(registry)
    }
}
