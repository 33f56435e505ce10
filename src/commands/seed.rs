use anyhow::{ensure, Result};

use crate::{cli::{Cli, SeedArgs}, io::basemap::read_base_map};

pub async fn run(cli: &Cli, args: &SeedArgs) -> Result<()> {
    ensure!(args.shp.is_file(), "no such file: {}", args.shp.display());

    let config = super::load_config(cli)?;
    let store = super::open_store(&config).await?;

    let path = args.shp.clone();
    let rows = tokio::task::spawn_blocking(move || read_base_map(&path)).await??;
    let written = store.seed_base_map(&rows, args.force).await?;

    if written == 0 && !rows.is_empty() {
        println!("Base map already loaded; pass --force to replace it.");
    } else {
        println!("Loaded {written} base map polygons from {}", args.shp.display());
    }
    Ok(())
}
