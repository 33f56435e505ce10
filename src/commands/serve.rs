use anyhow::Result;

use crate::cli::{Cli, ServeArgs};

pub async fn run(cli: &Cli, args: &ServeArgs) -> Result<()> {
    let mut config = super::load_config(cli)?;
    if let Some(listen) = &args.listen {
        config.listen = listen.clone();
    }
    crate::server::serve(config).await
}
