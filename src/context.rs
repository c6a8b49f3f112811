//! Accessors for ambient process information used in error reports.
//!
//! Every accessor returns a default value when the information is not
//! available; none of them can fail.

use std::future::Future;
use sysinfo::System;

/// Rust compiler version captured by the build script.
pub const RUNTIME_VERSION: &str = env!("ERROR_REPORT_RUSTC_VERSION");

tokio::task_local! {
    static REQUEST_URL: String;
}

/// Run `fut` with `url` as the current request URL.
///
/// Reports built while `fut` is being polled use this URL when the host
/// context is in server mode.
pub async fn with_request_url<F: Future>(url: impl Into<String>, fut: F) -> F::Output {
    REQUEST_URL.scope(url.into(), fut).await
}

/// URL set by an enclosing [`with_request_url`], if any.
pub fn current_request_url() -> Option<String> {
    REQUEST_URL.try_with(|url| url.clone()).ok()
}

/// Source of process-level details for [`ReportBuilder`](crate::builder::ReportBuilder).
pub trait HostContext: Send + Sync {
    /// Whether the process is a command-line invocation rather than a
    /// request-serving process.
    fn running_in_console(&self) -> bool;

    /// Process arguments, `None` when unavailable.
    fn command_line(&self) -> Option<Vec<String>>;

    /// URL of the request being served, `None` outside a request.
    fn request_url(&self) -> Option<String>;

    fn hostname(&self) -> Option<String>;

    /// OS family name such as `Linux` or `Darwin`.
    fn os_family(&self) -> String;

    /// Kernel release, empty when unknown.
    fn os_version(&self) -> String;

    fn runtime_version(&self) -> String;
}

/// [`HostContext`] backed by the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemContext {
    console: bool,
}

impl SystemContext {
    /// Context for a command-line process.
    pub fn console() -> Self {
        SystemContext { console: true }
    }

    /// Context for a request-serving process.
    pub fn server() -> Self {
        SystemContext { console: false }
    }
}

impl HostContext for SystemContext {
    fn running_in_console(&self) -> bool {
        self.console
    }

    fn command_line(&self) -> Option<Vec<String>> {
        let args: Vec<String> = std::env::args().collect();
        if args.is_empty() {
            None
        } else {
            Some(args)
        }
    }

    fn request_url(&self) -> Option<String> {
        current_request_url()
    }

    fn hostname(&self) -> Option<String> {
        System::host_name().filter(|h| !h.is_empty())
    }

    fn os_family(&self) -> String {
        os_family_name(std::env::consts::OS).to_string()
    }

    fn os_version(&self) -> String {
        System::kernel_version().unwrap_or_default()
    }

    fn runtime_version(&self) -> String {
        RUNTIME_VERSION.to_string()
    }
}

fn os_family_name(os: &str) -> &'static str {
    match os {
        "linux" | "android" => "Linux",
        "macos" | "ios" => "Darwin",
        "windows" => "Windows",
        "freebsd" | "openbsd" | "netbsd" | "dragonfly" => "BSD",
        "solaris" | "illumos" => "Solaris",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_os_families() {
        assert_eq!(os_family_name("linux"), "Linux");
        assert_eq!(os_family_name("macos"), "Darwin");
        assert_eq!(os_family_name("freebsd"), "BSD");
        assert_eq!(os_family_name("haiku"), "Unknown");
    }

    #[tokio::test]
    async fn request_url_is_scoped() {
        assert_eq!(current_request_url(), None);

        let inside = with_request_url("https://app.test/orders?id=1", async {
            SystemContext::server().request_url()
        })
        .await;
        assert_eq!(inside.as_deref(), Some("https://app.test/orders?id=1"));

        assert_eq!(current_request_url(), None);
    }
}
