use std::io;

use anyhow::Context;

use stockroom_cli::{Config, demo};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    stockroom_observability::init(config.log_format);

    tracing::debug!(path = %config.inventory_path.display(), "starting demo run");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    demo::run(&config, &mut out)?;
    Ok(())
}
