use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use xsi_monitor_server::logging::{log_welcome, setup_logging};
use xsi_monitor_server::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "xsi-monitor", version, about = "XSI call-center agent monitor")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<String>,

    /// Do not start monitoring until POST /monitoring/start
    #[arg(long)]
    no_autostart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if args.no_autostart {
        config.autostart = false;
    }

    setup_logging(&config.logging)?;
    log_welcome("xsi-monitor", env!("CARGO_PKG_VERSION"));

    xsi_monitor_server::serve(config).await?;
    Ok(())
}
