use std::sync::Arc;

use relay_backends::BackendFactory;
use relay_core::config::AppConfig;
use relay_core::{EventKind, EventSink, Task, TaskStatus};
use relay_dispatcher::{DispatchEngine, EngineConfig};
use relay_infrastructure::InMemoryEventSink;

const CONFIG: &str = r#"
[dispatch]
retry_attempts = 2
base_delay_ms = 0

[storage]
kind = "memory"

[[backends]]
id = "flaky"
kind = "mock"
succeed = false

[[backends]]
id = "disabled"
kind = "mock"
enabled = false

[[backends]]
id = "steady"
kind = "mock"
response = "steady answer"
"#;

#[tokio::test]
async fn test_configured_backends_dispatch_in_order() {
    let config = AppConfig::from_toml(CONFIG).unwrap();
    let registry = BackendFactory::build_registry(&config.backends).await.unwrap();
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = DispatchEngine::with_config(
        registry,
        sink.clone(),
        EngineConfig::from(&config.dispatch),
    );

    let plan = config.dispatch.plan_for(config.enabled_backend_ids());
    assert_eq!(plan.backends, vec!["flaky".to_string(), "steady".to_string()]);

    let task = Task::new("what is the answer");
    let task_id = task.id;
    let result = engine.dispatch(task, &plan).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.attempts, 3);
    assert_eq!(result.outcome.backend_id, "steady");
    assert_eq!(result.outcome.result.as_deref(), Some("steady answer"));
    assert_eq!(result.task.status, TaskStatus::Completed);

    let events = sink.query_by_task(task_id).await.unwrap();
    assert_eq!(events.first().map(|e| e.kind), Some(EventKind::TaskStarted));
    assert_eq!(events.last().map(|e| e.kind), Some(EventKind::TaskCompleted));
    assert_eq!(events.len(), 8);
}

#[tokio::test]
async fn test_disabled_backend_in_plan_is_skipped() {
    let config = AppConfig::from_toml(CONFIG).unwrap();
    let registry = BackendFactory::build_registry(&config.backends).await.unwrap();
    let engine = DispatchEngine::new(registry, Arc::new(InMemoryEventSink::new()));

    let plan = config.dispatch.plan_for(["disabled"]);
    let result = engine.dispatch(Task::new("x"), &plan).await.unwrap();

    assert!(!result.is_success());
    assert_eq!(result.attempts, 0);
    assert_eq!(result.outcome.backend_id, "disabled");
}
