use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod scenario;

#[derive(Parser)]
#[command(
    name = "fairgrid",
    about = "FairGrid — replay allocation scenarios through the DRF sorter",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the order in which clients would be offered resources
    Sort {
        /// Scenario file (TOML)
        #[arg(short, long)]
        scenario: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Validate a sorter config and print it normalized
    Check {
        /// Sorter config file (TOML)
        #[arg(short, long)]
        config: String,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,fairgrid=debug"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sort { scenario, format } => commands::sort::sort(&scenario, &format),
        Commands::Check { config } => commands::check::check(&config),
    }
}
