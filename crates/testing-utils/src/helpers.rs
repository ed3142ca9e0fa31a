//! Assertions over recorded event sequences

use relay_core::{Event, EventKind, EventSink};
use uuid::Uuid;

/// Event kinds in order
pub fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

/// Backend ids of `backend_invoked` events, in order
pub fn invoked_backends(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::BackendInvoked)
        .filter_map(|e| e.backend_id.clone())
        .collect()
}

/// Loads the events of `task_id` and asserts their kinds match `expected`
pub async fn assert_event_sequence(
    sink: &dyn EventSink,
    task_id: Uuid,
    expected: &[EventKind],
) -> Vec<Event> {
    let events = sink.query_by_task(task_id).await.unwrap();
    assert_eq!(
        kinds(&events),
        expected,
        "unexpected event sequence for task {task_id}"
    );
    assert!(
        events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "events of task {task_id} are not ordered by timestamp"
    );
    events
}

/// Expected kinds for a dispatch that made `attempts` calls and ended with `terminal`
pub fn expected_sequence(attempts: usize, terminal: EventKind) -> Vec<EventKind> {
    let mut expected = vec![EventKind::TaskStarted];
    for _ in 0..attempts {
        expected.push(EventKind::BackendInvoked);
        expected.push(EventKind::BackendResponded);
    }
    expected.push(terminal);
    expected
}
