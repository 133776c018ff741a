use quotesheet::app;
use quotesheet::config::{self, AppConfig};
use std::env;
use std::path::Path;

/// Main entry point for the quotation server
///
/// Usage: `quotesheet [config.json]`. Without a config file every setting
/// takes its default (listen on 127.0.0.1:3000, workbook `quotations.bin.gz`).
/// Log verbosity follows `RUST_LOG` and defaults to `info`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = if args.len() >= 2 {
        config::load_from_file(Path::new(&args[1]))?
    } else {
        AppConfig::default()
    };

    log::info!(
        "starting quotation server ({} attempts per store call, table window {} rows)",
        config.retry.max_attempts,
        config.sheet.max_rows
    );
    app::run(config).await
}
