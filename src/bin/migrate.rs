use anyhow::{Context, Result};
use digital_life::{config::AppConfig, init_tracing};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AppConfig::from_env().context("failed to read configuration")?;

    config
        .open_store()
        .await
        .context("failed to run migrations")?;

    info!(backend = %config.database_backend, "schema is up to date");
    Ok(())
}
