//! logshard HTTP server binary entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use logshard_server::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter())),
        )
        .init();

    logshard_server::run(args).await
}
