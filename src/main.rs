use anyhow::Context;
use tracing::{error, info};

use news_digest::{
    app,
    config::{Config, ConfigError},
    observability::Telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                message,
                "panic occurred"
            );
        } else {
            error!(message, "panic occurred without location information");
        }
    }));

    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Arguments(err)) => err.exit(),
        Err(err) => return Err(err).context("failed to load configuration"),
    };
    let telemetry = Telemetry::new(config.debug()).context("failed to initialize telemetry")?;

    let outcome = app::run(&config, &telemetry).await?;
    info!(
        run_id = %outcome.run_id,
        output_dir = %config.output_dir().display(),
        "digest written"
    );
    Ok(())
}
