//! Test doubles for the backend and event sink traits
//!
//! These implementations are deterministic and observable: every call is
//! counted so tests can assert exactly how the dispatch engine drove them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    AttemptOutcome, Backend, Event, EventFilter, EventId, EventSink, NewEvent, RelayError,
    Result, Task, Usage,
};
use relay_infrastructure::InMemoryEventSink;

/// One scripted reaction of a [`ScriptedBackend`] to `execute`
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Successful outcome carrying the given text
    Succeed(String),
    /// Failed outcome carrying the given error message
    Fail(String),
    /// `execute` returns `Err`
    Error(String),
    /// `execute` panics with the given message
    Panic(String),
    /// `execute` never completes
    Hang,
    /// Returned as-is, used to exercise outcome normalization
    Raw(AttemptOutcome),
}

impl ScriptedResponse {
    pub fn succeed(result: impl Into<String>) -> Self {
        Self::Succeed(result.into())
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Backend whose responses are played back from a script
///
/// Each `execute` call pops the next scripted response; once the script is
/// exhausted the fallback response is used for every further call.
#[derive(Debug)]
pub struct ScriptedBackend {
    id: String,
    available: AtomicBool,
    panic_on_probe: AtomicBool,
    hang_on_probe: AtomicBool,
    script: Mutex<VecDeque<ScriptedResponse>>,
    fallback: ScriptedResponse,
    delay: Duration,
    usage: Option<Usage>,
    calls: AtomicU32,
    probes: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(id: impl Into<String>, fallback: ScriptedResponse) -> Self {
        Self {
            id: id.into(),
            available: AtomicBool::new(true),
            panic_on_probe: AtomicBool::new(false),
            hang_on_probe: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            usage: None,
            calls: AtomicU32::new(0),
            probes: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always succeeds with `result`
    pub fn succeeding(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self::new(id, ScriptedResponse::succeed(result))
    }

    /// Always fails with `error`
    pub fn failing(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(id, ScriptedResponse::fail(error))
    }

    /// Probe reports unavailable; `execute` would succeed if it were ever called
    pub fn unavailable(id: impl Into<String>) -> Self {
        let backend = Self::succeeding(id, "unreachable");
        backend.set_available(false);
        backend
    }

    pub fn with_script<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = ScriptedResponse>,
    {
        self.script
            .lock()
            .unwrap()
            .extend(responses);
        self
    }

    /// Simulated latency applied before every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_panicking_probe(self) -> Self {
        self.panic_on_probe.store(true, Ordering::SeqCst);
        self
    }

    /// Probe never completes
    pub fn with_hanging_probe(self) -> Self {
        self.hang_on_probe.store(true, Ordering::SeqCst);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    /// Prompts received by `execute`, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_response(&self) -> ScriptedResponse {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn probe_availability(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_probe.load(Ordering::SeqCst) {
            panic!("probe exploded");
        }
        if self.hang_on_probe.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.available.load(Ordering::SeqCst)
    }

    async fn execute(&self, task: &Task) -> Result<AttemptOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(task.prompt.clone());
        let response = self.next_response();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = match response {
            ScriptedResponse::Succeed(result) => {
                AttemptOutcome::success(&self.id, result, self.delay)
            }
            ScriptedResponse::Fail(error) => AttemptOutcome::failure(&self.id, error, self.delay),
            ScriptedResponse::Error(message) => return Err(RelayError::backend_error(message)),
            ScriptedResponse::Panic(message) => panic!("{}", message),
            ScriptedResponse::Hang => std::future::pending().await,
            ScriptedResponse::Raw(outcome) => return Ok(outcome),
        };

        Ok(match self.usage {
            Some(usage) => outcome.with_usage(usage),
            None => outcome,
        })
    }

    fn description(&self) -> &str {
        "scripted test backend"
    }
}

/// Event sink that starts rejecting appends after a number of successful ones
#[derive(Debug)]
pub struct FlakySink {
    inner: InMemoryEventSink,
    healthy_appends: usize,
    appends: AtomicUsize,
}

impl FlakySink {
    pub fn new(healthy_appends: usize) -> Self {
        Self {
            inner: InMemoryEventSink::new(),
            healthy_appends,
            appends: AtomicUsize::new(0),
        }
    }

    /// Rejects every append
    pub fn broken() -> Self {
        Self::new(0)
    }

    pub fn append_attempts(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> Vec<Event> {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl EventSink for FlakySink {
    async fn append(&self, event: NewEvent) -> Result<EventId> {
        let n = self.appends.fetch_add(1, Ordering::SeqCst);
        if n >= self.healthy_appends {
            return Err(RelayError::sink_error("disk full"));
        }
        self.inner.append(event).await
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.inner.query(filter).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}

/// Event sink that declares it cannot take concurrent appends
///
/// It records the highest number of appends that were ever in flight at the
/// same time so tests can verify the batch coordinator serialized them.
#[derive(Debug, Default)]
pub struct SerialOnlySink {
    inner: InMemoryEventSink,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SerialOnlySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> Vec<Event> {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl EventSink for SerialOnlySink {
    async fn append(&self, event: NewEvent) -> Result<EventId> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::task::yield_now().await;
        let result = self.inner.append(event).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.inner.query(filter).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    fn supports_concurrent_append(&self) -> bool {
        false
    }
}
