//! packfs binary entry point.
//!
//! Parses command-line arguments, initializes logging and runs the
//! requested command against the image. For library usage, see the
//! packfs-cli crate documentation.

use anyhow::Result;
use packfs_cli::{CliConfig, run};

fn main() -> Result<()> {
    // Logs go to stderr so `cat` output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = CliConfig::from_args();
    config.validate()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&config, &mut out)
}
