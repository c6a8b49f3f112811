use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use comfy_table::{presets::UTF8_BORDERS_ONLY, Attribute, Cell, ContentArrangement, Table};
use tracing_error_report::config::AnalyticsConfig;
use tracing_error_report::context::SystemContext;
use tracing_error_report::diagnostic::{
    config_problems, mask_token, send_sample, token_has_expected_prefix, DiagnosticError, SampleKind,
};
use tracing_error_report::reporter::{collect_url, DeliveryError};

/// Send a sample error report to the collector to verify your integration.
///
/// Settings are read from the `ANALYTICS_*` environment variables; the
/// flags below override them.
#[derive(Parser, Debug)]
#[command(name = "error-report-test", version)]
struct Args {
    /// Type of sample to send
    #[arg(long = "type", value_enum, default_value_t = SampleKind::Exception)]
    kind: SampleKind,

    /// Custom message to send
    #[arg(long)]
    message: Option<String>,

    /// Collector base URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Site identifier
    #[arg(long)]
    site_id: Option<String>,
}

fn config_table(config: &AnalyticsConfig) -> String {
    let token = mask_token(&config.token);
    let site_id = if config.site_id.is_empty() { "<not set>" } else { config.site_id.as_str() };

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(vec!["Setting", "Value"]);

    for (setting, value) in [
        ("Endpoint", config.endpoint.as_str()),
        ("Site ID", site_id),
        ("Token", token.as_str()),
        ("Environment", config.environment.as_str()),
        ("Enabled", if config.enabled { "Yes" } else { "No" }),
    ] {
        table.add_row(vec![Cell::new(setting).add_attribute(Attribute::Bold), Cell::new(value)]);
    }

    table.to_string()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match AnalyticsConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR  {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(site_id) = args.site_id {
        config.site_id = site_id;
    }

    println!("INFO  Error reporting configuration");
    println!("{}", config_table(&config));

    let problems = config_problems(&config);
    if !problems.is_empty() {
        for problem in problems {
            eprintln!("ERROR  {problem}");
        }
        return ExitCode::FAILURE;
    }

    if !token_has_expected_prefix(&config.token) {
        eprintln!("WARN  token does not start with \"ak_\"");
    }

    println!("INFO  Sending sample {} to {}", args.kind, collect_url(&config.endpoint));

    let context = Arc::new(SystemContext::console());
    match send_sample(&config, args.kind, args.message.as_deref(), context).await {
        Ok(sent) => {
            println!("INFO  Sample error sent successfully!");
            println!();
            println!("  Message: {}", sent.report.message);
            println!("  Type: {}", sent.report.kind);
            println!("  Response: {}", sent.delivery.body);
            println!();
            println!("INFO  Check your dashboard to see the error.");
            ExitCode::SUCCESS
        }
        Err(DiagnosticError::Delivery(DeliveryError::Status { status, body })) => {
            eprintln!("ERROR  Server returned HTTP {status}");
            eprintln!("  Response: {body}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("ERROR  {e}");
            ExitCode::FAILURE
        }
    }
}
