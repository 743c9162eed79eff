use anyhow::{Error, Result};
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Tracing サブスクライバを一度だけ初期化する。
///
/// `RUST_LOG` が設定されていればそれに従い、無ければ `debug_mode` が真のとき
/// `debug`、偽のとき `info` レベルで JSON 形式のログを出力する。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init(debug_mode: bool) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let default_level = if debug_mode { "debug" } else { "info" };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;
        info!(debug_mode, default_level, "tracing initialized");

        Ok::<(), Error>(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_runs_once_and_tolerates_repeat_calls() {
        assert!(init(true).is_ok());
        assert!(init(false).is_ok());
        assert!(TRACING_INIT.get().is_some());
    }
}
