use crate::context::{current_request_url, with_request_url};
use crate::level::Level;
use crate::record::{ContextValue, ExceptionInfo, LogEvent, EXCEPTION_KEY, TAGS_KEY};
use crate::sink::Sink;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets whose events are never reported. Includes this crate and the
/// HTTP stack used for delivery, so a failing delivery cannot produce
/// another report.
const IGNORED_TARGETS: &[&str] = &[env!("CARGO_CRATE_NAME"), "reqwest", "hyper", "h2", "rustls"];

/// Field-name prefix that routes a field into the report tags,
/// e.g. `error!(tags.user_id = 42, "...")`.
const TAG_PREFIX: &str = "tags.";

/// Deliveries allowed to run at once before new events are dropped.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// `true` when `target` is one of [`IGNORED_TARGETS`] or a module below it.
fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target
            .strip_prefix(ignored)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// `tracing_subscriber` layer that hands events to a [`Sink`].
///
/// Each event the sink is handling is converted to a [`LogEvent`] and
/// delivered on its own task, so `on_event` never waits on the network.
/// At most `max_in_flight` deliveries run at once; events past that bound,
/// or arriving with no runtime available, are dropped and counted.
///
/// Fields are mapped as follows:
/// - `message` becomes the event message;
/// - an error recorded with `error = &err as &dyn Error` becomes the
///   attached exception;
/// - `tags.<key>` fields become report tags;
/// - everything else is stored in the event context.
pub struct ReportLayer {
    sink: Arc<dyn Sink>,
    runtime: Option<Handle>,
    in_flight: Arc<Semaphore>,
    tracker: TaskTracker,
    dropped_events: Arc<AtomicU64>,
}

/// Handle on the deliveries started by a [`ReportLayer`].
///
/// Call [`shutdown`](ReportHandle::shutdown) before the runtime goes away,
/// otherwise pending deliveries are cancelled with it.
#[derive(Clone)]
pub struct ReportHandle {
    tracker: TaskTracker,
    dropped_events: Arc<AtomicU64>,
}

impl ReportHandle {
    /// Events dropped because the in-flight bound was reached or no
    /// runtime was available.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Deliveries currently running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait up to `timeout` for the running deliveries. Returns `false` if
    /// some were still pending when the timeout elapsed.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let done = self.wait(timeout).await;
        self.tracker.reopen();
        done
    }

    /// Like [`flush`](ReportHandle::flush), for use right before exit.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.wait(timeout).await
    }

    async fn wait(&self, timeout: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
    }
}

impl ReportLayer {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        ReportLayer {
            sink,
            runtime: None,
            in_flight: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
            tracker: TaskTracker::new(),
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deliver on `handle` instead of the runtime current at event time.
    /// Needed for events logged from threads outside any runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.in_flight = Arc::new(Semaphore::new(max));
        self
    }

    pub fn handle(&self) -> ReportHandle {
        ReportHandle {
            tracker: self.tracker.clone(),
            dropped_events: Arc::clone(&self.dropped_events),
        }
    }

    fn dispatch(&self, mut event: LogEvent) {
        let Some(handle) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let sink = Arc::clone(&self.sink);
        // Task-locals do not cross `spawn`, carry the request URL over.
        let url = current_request_url();
        let deliver = async move {
            let _permit = permit;
            event.resolve_backtraces();
            match url {
                Some(url) => with_request_url(url, sink.handle(&event)).await,
                None => sink.handle(&event).await,
            }
        };
        self.tracker.spawn_on(deliver, &handle);
    }
}

impl<S> Layer<S> for ReportLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_ignored(meta.target()) {
            return;
        }

        let mut visitor = EventVisitor::new(meta.file().unwrap_or_default(), meta.line().unwrap_or(0));
        event.record(&mut visitor);
        let log_event = visitor.finish(Level::from(meta.level()), meta.target());

        if self.sink.is_handling(&log_event) {
            self.dispatch(log_event);
        }
    }
}

struct EventVisitor<'a> {
    file: &'a str,
    line: u32,
    message: Option<String>,
    fields: BTreeMap<String, serde_json::Value>,
    tags: serde_json::Map<String, serde_json::Value>,
    exception: Option<ExceptionInfo>,
}

impl<'a> EventVisitor<'a> {
    fn new(file: &'a str, line: u32) -> Self {
        EventVisitor {
            file,
            line,
            message: None,
            fields: BTreeMap::new(),
            tags: serde_json::Map::new(),
            exception: None,
        }
    }

    fn insert(&mut self, name: &str, value: serde_json::Value) {
        match name.strip_prefix(TAG_PREFIX) {
            Some(tag) => {
                self.tags.insert(tag.to_string(), value);
            }
            None => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }

    fn finish(self, level: Level, target: &str) -> LogEvent {
        let mut event = LogEvent::new(level, target, self.message.unwrap_or_default());

        for (name, value) in self.fields {
            event.context.insert(name, ContextValue::Value(value));
        }
        if !self.tags.is_empty() {
            event.context.insert(
                TAGS_KEY.to_string(),
                ContextValue::Value(serde_json::Value::Object(self.tags)),
            );
        }
        if let Some(exception) = self.exception {
            event
                .context
                .insert(EXCEPTION_KEY.to_string(), ContextValue::Exception(exception));
        }

        event
    }
}

impl<'a> Visit for EventVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field.name(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field.name(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field.name(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field.name(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field.name(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exception.is_none() {
            self.exception = Some(ExceptionInfo::from_dyn_error(value, self.file, self.line));
        }
        self.insert(field.name(), serde_json::Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.insert(field.name(), serde_json::Value::String(rendered));
        }
    }
}
