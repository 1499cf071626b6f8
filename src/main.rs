//! terraform-provider-bosk - plugin binary
//!
//! Spawned by the infrastructure host. Prints the handshake line on stdout and
//! serves the provider protocol until SIGTERM or SIGINT.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use terraform_provider_bosk::{
    init_logging_with_default, serve_on_with_options, serve_with_options, BoskProvider,
    ServeOptions,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "terraform-provider-bosk")]
#[command(about = "Provider plugin for bosk object nodes")]
#[command(version)]
struct Cli {
    /// Address to listen on (defaults to an ephemeral localhost port)
    #[arg(long, env = "BOSK_PROVIDER_ADDRESS")]
    address: Option<SocketAddr>,

    /// Seconds to let in-flight requests finish after a shutdown signal
    #[arg(long, default_value_t = 30)]
    shutdown_timeout_secs: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging_with_default(&cli.log_level);

    let options =
        ServeOptions::new().with_shutdown_timeout(Duration::from_secs(cli.shutdown_timeout_secs));
    info!(version = env!("CARGO_PKG_VERSION"), "Starting bosk provider");

    match cli.address {
        Some(addr) => serve_on_with_options(BoskProvider::new(), addr, options).await,
        None => serve_with_options(BoskProvider::new(), options).await,
    }
}
