use anyhow::{anyhow, bail, Context, Result};

use crate::{cli::{Cli, ExportArgs}, io::export::export_data};

pub async fn run(cli: &Cli, args: &ExportArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let store = super::open_store(&config).await?;

    let archive = export_data(&store, args.id).await?
        .ok_or_else(|| anyhow!("no shapefile with id {}", args.id))?;

    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let path = args.out.join(&archive.filename);
    if path.exists() && !args.force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    tokio::fs::write(&path, &archive.bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Exported shapefile {} -> {}", args.id, path.display());
    Ok(())
}
