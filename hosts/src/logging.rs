//! ロギング初期化
//!
//! `RUST_LOG` が設定されていればそれを優先し、なければ `--log-level` の値を使う。

use consul_hosts_common::error::CommonError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// グローバルなtracingサブスクライバーを設定
pub fn init(level: &str) -> Result<(), CommonError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| CommonError::Config(format!("Invalid log level {}: {}", level, e)))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| CommonError::Config(format!("Failed to initialize logging: {}", e)))
}
