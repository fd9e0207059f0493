use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use webmail::bloom::{BloomConfig, BloomFilter};
use webmail::protocol;

#[derive(Parser, Debug)]
#[command(
    name = "blacklist-server",
    about = "URL blacklist server speaking a line protocol over TCP"
)]
struct Args {
    port: u16,

    /// Filter size in bits followed by one depth per hash function
    #[arg(required = true, num_args = 2.., value_name = "SIZE DEPTH")]
    filter: Vec<String>,

    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Where the blacklisted URLs are kept between runs
    #[arg(long)]
    data_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Invalid arguments exit quietly; nothing is printed before startup succeeds
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => std::process::exit(1),
    };
    let Ok(config) = args.filter.join(" ").parse::<BloomConfig>() else {
        std::process::exit(1);
    };

    webmail::init_tracing();
    let filter = BloomFilter::new(config, args.data_file);
    tracing::info!(urls = filter.len(), "blacklist loaded");

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("blacklist server listening on {}", addr);

    protocol::serve(listener, Arc::new(Mutex::new(filter))).await?;
    Ok(())
}
