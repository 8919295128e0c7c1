//! A small CLI that drives one of the `spec.md §8` end-to-end scenarios
//! against an in-process `xds-cache` and prints what the simulated
//! consumer stream observed. Useful for manually poking at the cache's
//! behavior without standing up a real gRPC server.

use clap::{Parser, ValueEnum};
use xds_cache_harness::scenario;

#[derive(Parser)]
#[command(name = "xds-cache-demo")]
#[command(about = "Drives a scenario against an in-process xds-cache snapshot cache")]
struct Cli {
    /// Which scenario to run.
    #[arg(value_enum, default_value_t = Scenario::ColdStart)]
    scenario: Scenario,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum Scenario {
    ColdStart,
    OpenThenUpdate,
    NoOpReinstall,
    AdsSuppression,
    SubsetFastPath,
    Heartbeat,
    DeltaUpdate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| filter.to_string()),
        ))
        .init();

    match cli.scenario {
        Scenario::ColdStart => println!("{:#?}", scenario::cold_start().await),
        Scenario::OpenThenUpdate => println!("{:#?}", scenario::open_then_update().await),
        Scenario::NoOpReinstall => println!("{:#?}", scenario::no_op_reinstall().await),
        Scenario::AdsSuppression => println!("{:#?}", scenario::ads_suppression().await),
        Scenario::SubsetFastPath => println!("{:#?}", scenario::subset_fast_path().await),
        Scenario::Heartbeat => println!("{:#?}", scenario::heartbeat().await),
        Scenario::DeltaUpdate => println!("{:#?}", scenario::delta_update().await),
    }
}
