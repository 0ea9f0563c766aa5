use anyhow::Context;
use fieldlens_core::AppConfig;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    fieldlens_host::init_tracing(&config.logging);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(fieldlens_host::run(config))
}
