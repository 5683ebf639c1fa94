// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use sm_core::config::Config;

#[derive(Parser)]
#[command(name = "sm-daemon", version, about = "Multi-agent coding session manager daemon.")]
struct Cli {
    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.config.log_level.clone()));
    if cli.config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Err(e) = sm_daemon::run(cli.config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
