use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_error_report::{
    builder::ReportBuilder,
    init::init_tracing,
    level::Level,
    record::LogEvent,
    reporter::Reporter,
    sink::{ChainSink, Sink},
};

/// Example of a completely custom destination: it prints the report it
/// would have sent instead of posting it anywhere.
struct StdoutSink {
    builder: ReportBuilder,
}

#[async_trait]
impl Sink for StdoutSink {
    async fn handle(&self, event: &LogEvent) {
        let report = self.builder.build(event);
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("[stdout-sink] {}", json),
            Err(e) => eprintln!("[stdout-sink] could not render report: {}", e),
        }
    }

    fn is_handling(&self, event: &LogEvent) -> bool {
        event.level >= Level::Warning
    }
}

#[tokio::main]
async fn main() {
    let printer = Arc::new(StdoutSink {
        builder: ReportBuilder::new("demo-site", "development"),
    });
    // Unreachable collector: delivery fails silently.
    let reporter = Arc::new(Reporter::new("ak_demo", "http://127.0.0.1:9", "demo-site", "development"));

    let sink: Arc<dyn Sink> = Arc::new(ChainSink::new(vec![printer as Arc<dyn Sink>, reporter]));
    let reports = match init_tracing(sink) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("tracing already initialised: {}", e);
            return;
        }
    };

    info!("custom sink example started");
    error!(db = "orders", "simulated error sent through a custom sink");

    reports.shutdown(std::time::Duration::from_secs(5)).await;
}
