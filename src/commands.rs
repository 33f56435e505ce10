pub mod export;
pub mod import;
pub mod seed;
pub mod serve;

use anyhow::Result;

use crate::{cli::Cli, config::Config, store::Store};

/// Configuration file (if any) with the global command-line overrides applied.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = &cli.database {
        config.database_url = url.clone();
    }
    Ok(config)
}

pub async fn open_store(config: &Config) -> Result<Store> {
    Store::connect(&config.database_url).await
}
