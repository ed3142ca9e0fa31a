use std::sync::Arc;
use std::time::Duration;

use relay_core::{Backend, BatchMode, EventKind, EventSink, RelayError, TaskStatus};
use relay_dispatcher::{BatchCoordinator, DispatchEngine, DispatchJob};
use relay_infrastructure::InMemoryEventSink;
use relay_testing_utils::{
    assert_event_sequence, expected_sequence, plan, registry_with, ScriptedBackend,
    SerialOnlySink, TaskBuilder,
};
use tokio::time::Instant;

async fn engine_with_sink(
    backends: Vec<Arc<ScriptedBackend>>,
    sink: Arc<dyn EventSink>,
) -> Arc<DispatchEngine> {
    let registry = registry_with(
        backends
            .iter()
            .map(|b| (b.id(), b.clone() as Arc<dyn Backend>))
            .collect(),
    )
    .await;
    Arc::new(DispatchEngine::new(registry, sink))
}

fn slow_backend(id: &str) -> Arc<ScriptedBackend> {
    Arc::new(ScriptedBackend::succeeding(id, "ok").with_delay(Duration::from_millis(100)))
}

#[tokio::test]
async fn test_results_follow_input_order() {
    let echo = Arc::new(ScriptedBackend::succeeding("echo", "ok"));
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_sink(vec![echo.clone()], sink.clone()).await;
    let coordinator = BatchCoordinator::new(engine);

    let tasks = TaskBuilder::batch("job", 5);
    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();

    for mode in [BatchMode::Sequential, BatchMode::Concurrent] {
        let results = coordinator
            .dispatch_tasks(tasks.clone(), &plan(&["echo"], 1), mode)
            .await;

        let result_ids: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().task.id)
            .collect();
        assert_eq!(result_ids, ids, "mode {mode:?}");
        assert!(results
            .iter()
            .all(|r| r.as_ref().unwrap().task.status == TaskStatus::Completed));
    }
    assert_eq!(echo.call_count(), 10);
}

#[tokio::test]
async fn test_each_task_has_own_event_sequence() {
    let echo = Arc::new(ScriptedBackend::succeeding("echo", "ok"));
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_sink(vec![echo], sink.clone()).await;
    let coordinator = BatchCoordinator::new(engine);

    let tasks = TaskBuilder::batch("job", 4);
    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
    coordinator
        .dispatch_tasks(tasks, &plan(&["echo"], 1), BatchMode::Concurrent)
        .await;

    for id in ids {
        assert_event_sequence(
            sink.as_ref(),
            id,
            &expected_sequence(1, EventKind::TaskCompleted),
        )
        .await;
    }
}

#[tokio::test]
async fn test_fatal_error_does_not_stop_batch() {
    let echo = Arc::new(ScriptedBackend::succeeding("echo", "ok"));
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_sink(vec![echo], sink).await;
    let coordinator = BatchCoordinator::new(engine);

    let jobs = vec![
        DispatchJob::new(TaskBuilder::new().build(), plan(&["echo"], 1)),
        DispatchJob::new(TaskBuilder::new().build(), plan(&[], 1)),
        DispatchJob::new(TaskBuilder::new().running().build(), plan(&["echo"], 1)),
        DispatchJob::new(TaskBuilder::new().build(), plan(&["missing"], 1)),
    ];

    let results = coordinator.dispatch_all(jobs, BatchMode::Sequential).await;

    assert_eq!(results.len(), 4);
    assert!(results[0].as_ref().unwrap().is_success());
    assert!(matches!(results[1], Err(RelayError::EmptyPlan)));
    assert!(matches!(results[2], Err(RelayError::InvalidTaskState { .. })));
    assert!(!results[3].as_ref().unwrap().is_success());
}

#[tokio::test(start_paused = true)]
async fn test_sequential_runs_one_after_another() {
    let slow = slow_backend("slow");
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_sink(vec![slow], sink).await;
    let coordinator = BatchCoordinator::new(engine);

    let start = Instant::now();
    let results = coordinator
        .dispatch_tasks(
            TaskBuilder::batch("job", 3),
            &plan(&["slow"], 1),
            BatchMode::Sequential,
        )
        .await;

    assert_eq!(results.len(), 3);
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_overlaps_dispatches() {
    let slow = slow_backend("slow");
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_sink(vec![slow], sink).await;
    let coordinator = BatchCoordinator::new(engine);

    let start = Instant::now();
    let results = coordinator
        .dispatch_tasks(
            TaskBuilder::batch("job", 3),
            &plan(&["slow"], 1),
            BatchMode::Concurrent,
        )
        .await;

    assert!(results.iter().all(|r| r.as_ref().unwrap().is_success()));
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_bounded_concurrency() {
    let slow = slow_backend("slow");
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_sink(vec![slow], sink).await;
    let coordinator = BatchCoordinator::new(engine).with_max_concurrency(2);

    let tasks = TaskBuilder::batch("job", 4);
    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();

    let start = Instant::now();
    let results = coordinator
        .dispatch_tasks(tasks, &plan(&["slow"], 1), BatchMode::Concurrent)
        .await;
    let elapsed = start.elapsed();

    // 4个任务、并发上限2：两轮，每轮100ms
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "elapsed {elapsed:?}");

    let result_ids: Vec<_> = results
        .iter()
        .map(|r| r.as_ref().unwrap().task.id)
        .collect();
    assert_eq!(result_ids, ids);
}

#[tokio::test(start_paused = true)]
async fn test_serial_only_sink_forces_sequential() {
    let slow = slow_backend("slow");
    let sink = Arc::new(SerialOnlySink::new());
    let engine = engine_with_sink(vec![slow], sink.clone()).await;
    let coordinator = BatchCoordinator::new(engine);

    let start = Instant::now();
    let results = coordinator
        .dispatch_tasks(
            TaskBuilder::batch("job", 3),
            &plan(&["slow"], 1),
            BatchMode::Concurrent,
        )
        .await;

    assert!(results.iter().all(|r| r.as_ref().unwrap().is_success()));
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(sink.max_in_flight(), 1);
    assert_eq!(sink.stored().await.len(), 12);
}

#[tokio::test]
async fn test_empty_batch() {
    let sink = Arc::new(InMemoryEventSink::new());
    let engine = engine_with_sink(Vec::new(), sink.clone()).await;
    let coordinator = BatchCoordinator::new(engine);

    for mode in [BatchMode::Sequential, BatchMode::Concurrent] {
        assert!(coordinator.dispatch_all(Vec::new(), mode).await.is_empty());
    }
    assert!(sink.is_empty().await);
}
