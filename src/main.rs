use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use webmail::config::Config;
use webmail::routes::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "webmail", about = "Webmail REST API server")]
struct Args {
    /// Settings file [default: settings.toml]; defaults apply when it does not exist
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the settings file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webmail::init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let blacklist = config.blacklist.build()?;
    tracing::info!(mode = ?config.blacklist.mode, "blacklist ready");

    let listener = std::net::TcpListener::bind(&config.server.bind)
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
        }
        tracing::info!("shutting down");
    };

    routes::serve(listener, AppState::in_memory(blacklist), shutdown)
        .await
        .context("Server error")?;
    Ok(())
}
