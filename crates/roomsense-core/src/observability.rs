//! Observability - tracing subscriber の初期化
//!
//! `RUST_LOG` が設定されていればそちらを優先し、無ければ `logging.level` を使う。

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, thiserror::Error)]
pub enum TracingInitError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, TracingInitError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.level)?),
    }
}

/// グローバル subscriber を設定する。プロセスで 1 回だけ呼ぶ。
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingInitError> {
    let filter = env_filter(config)?;
    let fmt_layer = match config.format {
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
