// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use hub_core::config::{HubConfig, LogFormat};

#[derive(Parser)]
#[command(name = "hubd", version, about = "Fleet-monitoring hub core daemon.")]
struct Cli {
    #[command(flatten)]
    config: HubConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match cli.config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(env_filter).json().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
        }
    }

    if let Err(e) = hub_core::run(cli.config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
