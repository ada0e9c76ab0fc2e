//! Broadcast Chat Server - Entry Point
//!
//! Parses the port and worker count, binds the listener and runs the
//! worker pool until the process is terminated.

use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use broadcast_chat_server::config::DEFAULT_WORKERS;
use broadcast_chat_server::{Server, ServerConfig};

/// Multi-threaded broadcast chat server
#[derive(Parser, Debug)]
#[command(name = "broadcast_chat_server", version, about)]
struct Args {
    /// Port to listen on (all local IPv4 addresses)
    #[arg(default_value = "8080")]
    port: String,

    /// Number of worker threads
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
}

fn main() {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=broadcast_chat_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("broadcast_chat_server=info")),
        )
        .with_thread_names(true)
        .init();

    let args = Args::parse();

    let server = match Server::bind(ServerConfig::new(args.port, args.workers)) {
        Ok(server) => server,
        Err(e) => {
            error!("Startup failed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.start() {
        error!("Server failed: {}", e);
        process::exit(1);
    }
}
