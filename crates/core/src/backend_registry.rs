use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    traits::{Backend, BackendRegistry},
    Result,
};

pub struct DefaultBackendRegistry {
    backends: Arc<RwLock<HashMap<String, Arc<dyn Backend>>>>,
}

impl DefaultBackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 所有后端的描述和当前可用性，按标识排序
    pub async fn get_all_backend_info(&self) -> Vec<BackendInfo> {
        let snapshot = self.snapshot().await;
        let mut infos = Vec::with_capacity(snapshot.len());

        for (id, backend) in snapshot {
            let available = backend.probe_availability().await;
            infos.push(BackendInfo {
                id,
                description: backend.description().to_string(),
                available,
            });
        }

        infos
    }

    /// 复制一份当前映射，探测时不持有读锁
    async fn snapshot(&self) -> Vec<(String, Arc<dyn Backend>)> {
        let registry = self.backends.read().await;
        let mut entries: Vec<_> = registry
            .iter()
            .map(|(id, backend)| (id.clone(), Arc::clone(backend)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for DefaultBackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendRegistry for DefaultBackendRegistry {
    async fn register(&self, id: String, backend: Arc<dyn Backend>) -> Result<()> {
        let mut registry = self.backends.write().await;
        if registry.insert(id.clone(), backend).is_some() {
            info!("后端 {} 已被替换", id);
        } else {
            debug!("注册后端 {}", id);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Option<Arc<dyn Backend>> {
        let registry = self.backends.read().await;
        registry.get(id).cloned()
    }

    async fn list(&self) -> Vec<String> {
        let registry = self.backends.read().await;
        let mut ids: Vec<String> = registry.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn unregister(&self, id: &str) -> Result<bool> {
        let mut registry = self.backends.write().await;
        Ok(registry.remove(id).is_some())
    }

    async fn clear(&self) {
        let mut registry = self.backends.write().await;
        registry.clear();
    }

    async fn contains(&self, id: &str) -> bool {
        let registry = self.backends.read().await;
        registry.contains_key(id)
    }

    async fn count(&self) -> usize {
        let registry = self.backends.read().await;
        registry.len()
    }

    async fn probe_all(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();

        for (id, backend) in self.snapshot().await {
            let available = backend.probe_availability().await;
            results.insert(id, available);
        }

        results
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BackendInfo {
    pub id: String,
    pub description: String,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{AttemptOutcome, Task};

    struct StaticBackend {
        available: bool,
    }

    #[async_trait]
    impl Backend for StaticBackend {
        async fn probe_availability(&self) -> bool {
            self.available
        }

        async fn execute(&self, task: &Task) -> Result<AttemptOutcome> {
            Ok(AttemptOutcome::success("static", task.prompt.clone(), Duration::ZERO))
        }

        fn description(&self) -> &str {
            "static test backend"
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = DefaultBackendRegistry::new();
        registry
            .register("b".into(), Arc::new(StaticBackend { available: true }))
            .await
            .unwrap();
        registry
            .register("a".into(), Arc::new(StaticBackend { available: false }))
            .await
            .unwrap();

        assert_eq!(registry.count().await, 2);
        assert!(registry.contains("a").await);
        assert!(registry.get("missing").await.is_none());
        assert_eq!(registry.list().await, vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister("a").await.unwrap());
        assert!(!registry.unregister("a").await.unwrap());
        assert_eq!(registry.count().await, 1);

        registry.clear().await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_probe_all_and_info() {
        let registry = DefaultBackendRegistry::new();
        registry
            .register("up".to_string(), Arc::new(StaticBackend { available: true }))
            .await
            .unwrap();
        registry
            .register("down".to_string(), Arc::new(StaticBackend { available: false }))
            .await
            .unwrap();

        let probes = registry.probe_all().await;
        assert_eq!(probes.get("up"), Some(&true));
        assert_eq!(probes.get("down"), Some(&false));

        let all = registry.get_all_backend_info().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "down");
        assert!(!all[0].available);
        assert_eq!(all[1].description, "static test backend");
        assert!(all[1].available);
    }
}
