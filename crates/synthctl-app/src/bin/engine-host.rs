//! Standalone engine host process
//!
//! Serves the synthctl control protocol on stdin/stdout on top of the
//! loopback engine. `synthctl play --engine process` spawns it, and it doubles
//! as a reference for bridges to real synthesis servers.
//!
//! The host will:
//! 1. Send a `Ready` message to stdout
//! 2. Answer one JSON request per line from stdin
//! 3. Exit on `Quit` or when stdin closes
//!
//! Logs go to stderr; stdout carries protocol messages only.

use anyhow::{Context, Result};
use std::io;
use synthctl_engine::{EngineHost, LoopbackEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Exit code 2 tells the controller the host crashed
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("ENGINE HOST CRASHED: {panic_info}");
        std::process::exit(2);
    }));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synthctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut host = EngineHost::new(LoopbackEngine::new());
    host.serve(io::stdin().lock(), io::stdout().lock())
        .context("Engine host I/O failed")
}
