use crate::level::Level;
use chrono::{DateTime, Utc};
use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error;
use std::panic::Location;
use std::sync::Arc;

/// Context key holding an attached [`ExceptionInfo`].
pub const EXCEPTION_KEY: &str = "exception";

/// Context key holding a JSON object of extra report tags.
pub const TAGS_KEY: &str = "tags";

/// A single loggable occurrence handed to a [`Sink`](crate::sink::Sink).
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    /// Logging source, e.g. the `tracing` target.
    pub channel: String,
    pub level: Level,
    pub message: String,
    pub context: BTreeMap<String, ContextValue>,
}

/// Value stored in [`LogEvent::context`].
#[derive(Debug, Clone)]
pub enum ContextValue {
    Exception(ExceptionInfo),
    Value(serde_json::Value),
}

impl LogEvent {
    /// Create an event stamped with the current time and an empty context.
    pub fn new(level: Level, channel: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            channel: channel.into(),
            level,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach an error under the `exception` context key.
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.context
            .insert(EXCEPTION_KEY.to_string(), ContextValue::Exception(exception));
        self
    }

    /// Attach extra tags under the `tags` context key, merging with any
    /// tags already present.
    pub fn with_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = match self.context.remove(TAGS_KEY) {
            Some(ContextValue::Value(serde_json::Value::Object(map))) => map,
            _ => serde_json::Map::new(),
        };
        for (k, v) in tags {
            map.insert(k.into(), serde_json::Value::String(v.into()));
        }
        self.context
            .insert(TAGS_KEY.to_string(), ContextValue::Value(serde_json::Value::Object(map)));
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: ContextValue) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Render every unresolved backtrace held in the context.
    pub fn resolve_backtraces(&mut self) {
        for value in self.context.values_mut() {
            if let ContextValue::Exception(exception) = value {
                exception.resolve();
            }
        }
    }

    /// The attached exception, if the `exception` entry holds one.
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        match self.context.get(EXCEPTION_KEY) {
            Some(ContextValue::Exception(e)) => Some(e),
            _ => None,
        }
    }
}

/// Location of one stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub file: String,
    pub line: u32,
}

/// Read-only view over a caught error.
///
/// A captured backtrace is kept unresolved until [`ExceptionInfo::resolve`]
/// runs, so capturing on a logging thread only walks the stack. `trace`
/// and `frames` hold the rendered form once resolved.
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
    pub trace: String,
    pub file: String,
    pub line: u32,
    pub frames: Vec<Frame>,
    backtrace: Option<Arc<Backtrace>>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionInfo {
            type_name: type_name.into(),
            message: message.into(),
            trace: String::new(),
            file: String::new(),
            line: 0,
            frames: Vec::new(),
            backtrace: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// Capture a typed error at the call site.
    ///
    /// The type name comes from `E`, the location is the caller's, and the
    /// trace is the `source()` chain followed by a backtrace captured here
    /// and rendered on [`resolve`](Self::resolve).
    #[track_caller]
    pub fn capture<E: Error + 'static>(err: &E) -> Self {
        let location = Location::caller();

        ExceptionInfo {
            type_name: short_type_name(std::any::type_name::<E>()).to_string(),
            message: err.to_string(),
            trace: source_chain(err),
            file: location.file().to_string(),
            line: location.line(),
            frames: Vec::new(),
            backtrace: Some(Arc::new(Backtrace::force_capture())),
        }
    }

    /// Build from a type-erased error, e.g. one recorded on a `tracing`
    /// event. The type name is taken from the leading identifier of the
    /// error's `Debug` output.
    pub fn from_dyn_error(err: &(dyn Error + 'static), file: impl Into<String>, line: u32) -> Self {
        let debug = format!("{:?}", err);
        let type_name = debug_type_name(&debug).unwrap_or("Error").to_string();

        ExceptionInfo {
            type_name,
            message: err.to_string(),
            trace: source_chain(err),
            file: file.into(),
            line,
            frames: Vec::new(),
            backtrace: Some(Arc::new(Backtrace::force_capture())),
        }
    }

    /// Whether a captured backtrace still waits to be rendered.
    pub fn is_resolved(&self) -> bool {
        self.backtrace.is_none()
    }

    /// Render the captured backtrace into `trace` and `frames`.
    /// Symbol lookup happens here, not at capture time.
    pub fn resolve(&mut self) {
        if let Some(backtrace) = self.backtrace.take() {
            let rendered = backtrace.to_string();
            self.frames = parse_frames(&rendered);
            self.trace.push_str(&rendered);
        }
    }

    /// This exception with its backtrace rendered, cloning only when
    /// there is something left to resolve.
    pub fn resolved(&self) -> Cow<'_, ExceptionInfo> {
        if self.is_resolved() {
            Cow::Borrowed(self)
        } else {
            let mut owned = self.clone();
            owned.resolve();
            Cow::Owned(owned)
        }
    }

    /// `file:line` of the first frame, or of the error itself when the
    /// trace has no frames.
    pub fn first_frame(&self) -> String {
        match self.frames.first() {
            Some(frame) => format!("{}:{}", frame.file, frame.line),
            None => format!("{}:{}", self.file, self.line),
        }
    }
}

/// Strip generic arguments and module path from a Rust type name.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn debug_type_name(debug: &str) -> Option<&str> {
    let end = debug
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(debug.len());
    let name = &debug[..end];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        None
    } else {
        Some(name)
    }
}

fn source_chain(err: &(dyn Error + 'static)) -> String {
    let mut out = String::new();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("caused by: ");
        out.push_str(&cause.to_string());
        out.push('\n');
        source = cause.source();
    }
    out
}

// Frames from the standard library, the runtime and this crate are skipped
// so the first frame points at application code.
const SKIPPED_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "tokio::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
    "tracing_error_report::",
    "<",
];

/// Parse `at file:line:col` entries out of a rendered backtrace.
pub(crate) fn parse_frames(backtrace: &str) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut function = "";

    for raw in backtrace.lines() {
        let line = raw.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if SKIPPED_PREFIXES.iter().any(|p| function.starts_with(p))
                || location.starts_with("/rustc/")
            {
                continue;
            }
            let mut parts = location.rsplitn(3, ':');
            let _col = parts.next();
            let line_no = parts.next().and_then(|l| l.parse::<u32>().ok());
            let file = parts.next();
            if let (Some(file), Some(line_no)) = (file, line_no) {
                frames.push(Frame {
                    file: file.to_string(),
                    line: line_no,
                });
            }
        } else if let Some((index, name)) = line.split_once(": ") {
            if index.chars().all(|c| c.is_ascii_digit()) {
                function = name;
            }
        }
    }

    frames
}
