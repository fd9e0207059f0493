pub mod actions;
pub mod auth;
pub mod blacklist;
pub mod bloom;
pub mod card;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod protocol;
pub mod routes;
pub mod store;

/// Install the `tracing` subscriber, honouring `RUST_LOG` and defaulting to `info`
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
