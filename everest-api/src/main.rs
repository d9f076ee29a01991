use everest_api::{config::ApiConfig, startup::Application};
use everest_config::load_config;
use everest_telemetry::tracing::init_tracing;
use tracing::info;

fn main() -> anyhow::Result<()> {
    // Initialize tracing from the binary name
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // We start the runtime.
    actix_web::rt::System::new().block_on(async_main())?;

    Ok(())
}

async fn async_main() -> anyhow::Result<()> {
    let config = load_config::<ApiConfig>()?;
    info!("application settings:\n{}", config.application);

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
