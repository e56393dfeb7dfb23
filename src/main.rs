//! IP Gate CLI.

use anyhow::Result;
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zentinel_ip_gate::{Config, Gate};

#[derive(Parser, Debug)]
#[command(name = "zentinel-ip-gate")]
#[command(about = "IP Gate for Zentinel - route requests by client address against an allowlist or denylist")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ip-gate.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Addresses to check; reads one per line from stdin when omitted
    #[arg(long, value_name = "ADDR", num_args = 1..)]
    check: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)?;
    let gate = Gate::from_config(&config)?;

    // Handle --validate
    if args.validate {
        info!(mode = %gate.mode(), entries = gate.matchers().len(), "Configuration is valid");
        return Ok(());
    }

    if !args.check.is_empty() {
        for address in &args.check {
            println!("{}\t{}", address, gate.decide_address(Some(address.as_str())));
        }
        return Ok(());
    }

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let address = line.trim();
        if address.is_empty() {
            continue;
        }
        println!("{}\t{}", address, gate.decide_address(Some(address)));
    }

    Ok(())
}
