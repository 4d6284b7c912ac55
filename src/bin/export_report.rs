//! Run a bulk report and print its records as JSON lines.
//!
//! ```sh
//! export SHOP_URL='https://demo.myshopify.com'
//! export SHOP_ACCESS_TOKEN='shpat_...'
//! cargo run --bin export-report -- product-variant-inventory > inventory.jsonl
//! ```
//!
//! Progress goes to stderr through `RUST_LOG` (default `info`). Ctrl-C
//! stops polling and exits without output.

use std::io::{BufWriter, Write};

use busbar_shop_bulk::{BulkExporter, ReportRegistry, ReportType};
use busbar_shop_client::{CancellationToken, ShopClient};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn usage(registry: &ReportRegistry) -> ! {
    eprintln!("Usage: export-report <report>");
    eprintln!();
    eprintln!("Reports:");
    for report_type in registry.report_types() {
        eprintln!("  {report_type}");
    }
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SHOP_URL            https://<shop>.myshopify.com");
    eprintln!("  SHOP_ACCESS_TOKEN   Admin API access token");
    eprintln!("  SHOP_API_VERSION    API version (optional)");
    std::process::exit(2);
}

fn require_env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        eprintln!("Error: {name} environment variable is not set.");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let registry = ReportRegistry::standard();
    let report_type = match std::env::args().nth(1) {
        Some(arg) if arg != "-h" && arg != "--help" => ReportType::from(arg.as_str()),
        _ => usage(&registry),
    };
    if registry.get(&report_type).is_err() {
        eprintln!("Error: unknown report `{report_type}`.\n");
        usage(&registry);
    }

    let shop_url = require_env("SHOP_URL");
    let access_token = require_env("SHOP_ACCESS_TOKEN");

    let mut client = ShopClient::new(shop_url, access_token).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    if let Ok(version) = std::env::var("SHOP_API_VERSION") {
        client = client.with_api_version(version);
    }

    let exporter = BulkExporter::from_client(client).with_registry(registry);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, canceling export");
            on_interrupt.cancel();
        }
    });

    let records = match exporter.run_untyped(&report_type, &cancel).await {
        Ok(records) => records,
        Err(e) if e.is_canceled() => {
            eprintln!("Export canceled.");
            std::process::exit(130);
        }
        Err(e) => {
            error!(error = %e, "Export failed");
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for record in &records {
        let written = serde_json::to_writer(&mut out, record)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"));
        if let Err(e) = written {
            error!(error = %e, "Failed to write record");
            std::process::exit(1);
        }
    }
    if let Err(e) = out.flush() {
        error!(error = %e, "Failed to flush output");
        std::process::exit(1);
    }

    info!(report = %report_type, records = records.len(), "Export complete");
}
