use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use stretchnet::cli::{build_plan, format_plan, Args};
use stretchnet::config::load_topology_file;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let topology = match load_topology_file(&args.topology_file) {
        Ok(topology) => topology,
        Err(e) => {
            error!(
                "Failed to load topology file {}: {}",
                args.topology_file.display(),
                e
            );
            process::exit(1);
        }
    };

    let plan = match build_plan(&topology, args.pod.as_deref()).await {
        Ok(plan) => plan,
        Err(e) => {
            error!("Failed to plan endpoints: {:#}", e);
            process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize plan: {}", e);
                process::exit(1);
            }
        }
    } else {
        print!("{}", format_plan(&plan));
    }
}
