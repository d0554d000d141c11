use anyhow::Context;
use finrisk::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    finrisk::init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    finrisk::run(config).await.context("service failed")?;

    Ok(())
}
