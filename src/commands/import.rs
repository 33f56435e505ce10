use anyhow::{Context, Result};

use crate::{cli::{Cli, ImportArgs}, io::import::import_data};

pub async fn run(cli: &Cli, args: &ImportArgs) -> Result<()> {
    let data = tokio::fs::read(&args.archive)
        .await
        .with_context(|| format!("failed to read {}", args.archive.display()))?;

    let config = super::load_config(cli)?;
    let store = super::open_store(&config).await?;

    let id = import_data(&store, data.into(), args.encoding).await?;
    println!("{id}");
    Ok(())
}
