//! 日志初始化

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// 构建日志过滤器，`RUST_LOG` 优先于配置
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log filter: {}", config.level)),
    }
}

/// 安装全局日志订阅器
///
/// 已经安装过时返回 `Ok(false)`，不会覆盖已有的订阅器。
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_target);

    let installed = if config.compact {
        builder.compact().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::info!("Logging initialized at level {}", config.level);
    }
    Ok(installed)
}
