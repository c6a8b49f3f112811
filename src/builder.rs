use crate::context::{HostContext, SystemContext};
use crate::record::{ContextValue, ExceptionInfo, LogEvent, TAGS_KEY};
use crate::report::ErrorReport;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Client version reported as `sdkVersion`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Integration identifier reported as `framework`.
pub const FRAMEWORK: &str = "tracing";

/// URL scheme used for reports raised from command-line processes.
pub const CONSOLE_URL_SCHEME: &str = "artisan://";

const SERVER: &str = "server";

/// Turns [`LogEvent`]s into [`ErrorReport`]s.
///
/// The builder performs no I/O of its own and never fails: missing
/// process details degrade to empty values.
#[derive(Clone)]
pub struct ReportBuilder {
    site_id: String,
    environment: String,
    context: Arc<dyn HostContext>,
}

impl ReportBuilder {
    pub fn new(site_id: impl Into<String>, environment: impl Into<String>) -> Self {
        ReportBuilder {
            site_id: site_id.into(),
            environment: environment.into(),
            context: Arc::new(SystemContext::default()),
        }
    }

    /// Replace the source of process details.
    pub fn with_context(mut self, context: Arc<dyn HostContext>) -> Self {
        self.context = context;
        self
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Build from the event's attached exception when there is one,
    /// otherwise from its message.
    pub fn build(&self, event: &LogEvent) -> ErrorReport {
        match event.exception() {
            Some(exception) => self.from_exception(exception, event),
            None => self.from_message(event),
        }
    }

    pub fn from_exception(&self, exception: &ExceptionInfo, event: &LogEvent) -> ErrorReport {
        let exception = exception.resolved();
        let fingerprint = fingerprint(
            &exception.type_name,
            &exception.message,
            &exception.first_frame(),
        );

        self.report(
            event,
            exception.message.clone(),
            exception.type_name.clone(),
            exception.trace.clone(),
            exception.file.clone(),
            exception.line,
            fingerprint,
        )
    }

    pub fn from_message(&self, event: &LogEvent) -> ErrorReport {
        let kind = event.level.name();

        self.report(
            event,
            event.message.clone(),
            kind.to_string(),
            String::new(),
            String::new(),
            0,
            fingerprint(kind, &event.message, ""),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        event: &LogEvent,
        message: String,
        kind: String,
        stack: String,
        source: String,
        line: u32,
        fingerprint: String,
    ) -> ErrorReport {
        ErrorReport {
            message,
            kind,
            stack,
            source,
            line,
            col: 0,
            fingerprint,
            url: self.url(),
            user_agent: format!("Rust/{}", self.context.runtime_version()),
            browser: SERVER.to_string(),
            browser_version: String::new(),
            os: self.context.os_family(),
            os_version: self.context.os_version(),
            screen_width: 0,
            screen_height: 0,
            framework: FRAMEWORK.to_string(),
            sdk_version: SDK_VERSION.to_string(),
            environment: self.environment.clone(),
            tags: self.tags(event),
            breadcrumbs: Vec::new(),
            timestamp: event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            device_type: SERVER.to_string(),
        }
    }

    fn url(&self) -> String {
        if self.context.running_in_console() {
            let args = self
                .context
                .command_line()
                .map(|args| args.join(" "))
                .unwrap_or_else(|| "unknown".to_string());
            return format!("{}{}", CONSOLE_URL_SCHEME, args);
        }

        self.context.request_url().unwrap_or_default()
    }

    fn tags(&self, event: &LogEvent) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        tags.insert("site_id".to_string(), self.site_id.clone());
        tags.insert("rust_version".to_string(), self.context.runtime_version());
        tags.insert(
            "hostname".to_string(),
            self.context.hostname().unwrap_or_else(|| "unknown".to_string()),
        );
        tags.insert("log_channel".to_string(), event.channel.clone());

        if let Some(ContextValue::Value(serde_json::Value::Object(extra))) = event.context.get(TAGS_KEY) {
            for (key, value) in extra {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                tags.insert(key.clone(), value);
            }
        }

        tags
    }
}

/// MD5 hex digest of `type + message + frame`.
pub fn fingerprint(kind: &str, message: &str, frame: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(kind.as_bytes());
    hasher.update(message.as_bytes());
    hasher.update(frame.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::record::Frame;
    use chrono::{TimeZone, Utc};

    struct FixedContext {
        console: bool,
        args: Option<Vec<String>>,
        url: Option<String>,
    }

    impl HostContext for FixedContext {
        fn running_in_console(&self) -> bool {
            self.console
        }
        fn command_line(&self) -> Option<Vec<String>> {
            self.args.clone()
        }
        fn request_url(&self) -> Option<String> {
            self.url.clone()
        }
        fn hostname(&self) -> Option<String> {
            None
        }
        fn os_family(&self) -> String {
            "Linux".into()
        }
        fn os_version(&self) -> String {
            "6.1.0".into()
        }
        fn runtime_version(&self) -> String {
            "1.75.0".into()
        }
    }

    fn builder(context: FixedContext) -> ReportBuilder {
        ReportBuilder::new("site-1", "staging").with_context(Arc::new(context))
    }

    fn server() -> FixedContext {
        FixedContext { console: false, args: None, url: None }
    }

    fn runtime_error(message: &str) -> ExceptionInfo {
        ExceptionInfo::new("RuntimeError", message)
            .with_location("src/db.rs", 12)
            .with_trace("   0: my_app::db::connect\n             at src/db.rs:12:5")
            .with_frames(vec![Frame { file: "src/db.rs".into(), line: 12 }])
    }

    #[test]
    fn builds_from_exception() {
        let exception = runtime_error("DB connection lost");
        let event = LogEvent::new(Level::Error, "app", "DB connection lost").with_exception(exception);

        let report = builder(server()).build(&event);

        assert_eq!(report.kind, "RuntimeError");
        assert_eq!(report.message, "DB connection lost");
        assert_eq!(report.source, "src/db.rs");
        assert_eq!(report.line, 12);
        assert!(!report.stack.is_empty());
        assert_eq!(
            report.fingerprint,
            fingerprint("RuntimeError", "DB connection lost", "src/db.rs:12")
        );
    }

    #[test]
    fn unresolved_backtrace_is_rendered_into_stack() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let exception = ExceptionInfo::from_dyn_error(&err, "src/store.rs", 30);
        assert!(exception.trace.is_empty());

        let event = LogEvent::new(Level::Error, "app", "disk full").with_exception(exception);
        let report = builder(server()).build(&event);

        assert!(!report.stack.is_empty());
        assert_eq!(report.message, "disk full");
    }

    #[test]
    fn builds_from_message() {
        let event = LogEvent::new(Level::Error, "app", "Something failed");
        let report = builder(server()).build(&event);

        assert_eq!(report.kind, "Error");
        assert_eq!(report.stack, "");
        assert_eq!(report.source, "");
        assert_eq!(report.line, 0);
        assert_eq!(report.fingerprint, fingerprint("Error", "Something failed", ""));
    }

    #[test]
    fn fingerprint_is_md5_hex() {
        // md5("") is a well-known constant.
        assert_eq!(fingerprint("", "", ""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(fingerprint("Error", "x", "").len(), 32);
    }

    #[test]
    fn fingerprint_depends_on_message() {
        let b = builder(server());
        let a1 = b.from_exception(&runtime_error("Error A"), &LogEvent::new(Level::Error, "app", "Error A"));
        let a2 = b.from_exception(&runtime_error("Error A"), &LogEvent::new(Level::Error, "app", "Error A"));
        let bb = b.from_exception(&runtime_error("Error B"), &LogEvent::new(Level::Error, "app", "Error B"));

        assert_eq!(a1.fingerprint, a2.fingerprint);
        assert_ne!(a1.fingerprint, bb.fingerprint);
    }

    #[test]
    fn formats_timestamp_with_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
            + chrono::Duration::milliseconds(42);
        let event = LogEvent::new(Level::Error, "app", "x").with_timestamp(ts);

        let report = builder(server()).build(&event);
        assert_eq!(report.timestamp, "2024-03-05T07:08:09.042Z");
    }

    #[test]
    fn event_tags_override_base_tags() {
        let event = LogEvent::new(Level::Error, "payments", "x")
            .with_tags([("user_id", "42"), ("log_channel", "override")]);
        let report = builder(server()).build(&event);

        assert_eq!(report.tags["user_id"], "42");
        assert_eq!(report.tags["site_id"], "site-1");
        assert_eq!(report.tags["hostname"], "unknown");
        assert_eq!(report.tags["rust_version"], "1.75.0");
        assert_eq!(report.tags["log_channel"], "override");
    }

    #[test]
    fn non_string_tag_values_are_rendered() {
        let tags = serde_json::json!({ "attempt": 3, "ok": false });
        let event = LogEvent::new(Level::Error, "app", "x")
            .with_context(TAGS_KEY, ContextValue::Value(tags));
        let report = builder(server()).build(&event);

        assert_eq!(report.tags["attempt"], "3");
        assert_eq!(report.tags["ok"], "false");
    }

    #[test]
    fn non_object_tags_are_ignored() {
        let event = LogEvent::new(Level::Error, "app", "x")
            .with_context(TAGS_KEY, ContextValue::Value(serde_json::json!("oops")));
        let report = builder(server()).build(&event);

        assert_eq!(report.tags.len(), 4);
    }

    #[test]
    fn console_url_joins_arguments() {
        let ctx = FixedContext {
            console: true,
            args: Some(vec!["worker".into(), "--queue".into(), "mail".into()]),
            url: Some("https://ignored.test".into()),
        };
        let report = builder(ctx).build(&LogEvent::new(Level::Error, "app", "x"));
        assert_eq!(report.url, "artisan://worker --queue mail");

        let ctx = FixedContext { console: true, args: None, url: None };
        let report = builder(ctx).build(&LogEvent::new(Level::Error, "app", "x"));
        assert_eq!(report.url, "artisan://unknown");
    }

    #[test]
    fn server_url_uses_request_or_empty() {
        let ctx = FixedContext { console: false, args: None, url: Some("https://shop.test/cart?x=1".into()) };
        let report = builder(ctx).build(&LogEvent::new(Level::Error, "app", "x"));
        assert_eq!(report.url, "https://shop.test/cart?x=1");

        let report = builder(server()).build(&LogEvent::new(Level::Error, "app", "x"));
        assert_eq!(report.url, "");
    }

    #[test]
    fn fixed_fields_are_constant() {
        let report = builder(server()).build(&LogEvent::new(Level::Critical, "app", "x"));

        assert_eq!(report.col, 0);
        assert_eq!(report.browser, "server");
        assert_eq!(report.browser_version, "");
        assert_eq!(report.device_type, "server");
        assert_eq!(report.screen_width, 0);
        assert_eq!(report.screen_height, 0);
        assert_eq!(report.framework, FRAMEWORK);
        assert_eq!(report.sdk_version, SDK_VERSION);
        assert_eq!(report.environment, "staging");
        assert_eq!(report.user_agent, "Rust/1.75.0");
        assert_eq!(report.os, "Linux");
        assert_eq!(report.os_version, "6.1.0");
        assert!(report.breadcrumbs.is_empty());
    }
}
