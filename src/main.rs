use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shape_editor::cli::{Cli, Commands};
use shape_editor::commands::{export, import, seed, serve};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Serve(args) => serve::run(&cli, args).await,
        Commands::SeedBasemap(args) => seed::run(&cli, args).await,
        Commands::Import(args) => import::run(&cli, args).await,
        Commands::Export(args) => export::run(&cli, args).await,
    }
}

/// `RUST_LOG` wins; otherwise -v picks the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
