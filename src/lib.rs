pub mod api;
pub mod appointment;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod db;
pub mod directory;
pub mod error;
pub mod media;
pub mod models;
pub mod reporting;
pub mod session;
pub mod wallet;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError};
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Startup failed: {0}")]
    Core(#[from] CoreError),
    #[error("Cannot start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Initialize tracing, load configuration from the environment and serve
/// the API until ctrl-c.
pub fn run() -> Result<(), RunError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    let addr = config.bind_addr;
    // Built before the runtime: the image host owns a blocking HTTP client.
    let core = Arc::new(CoreState::from_config(config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        };
        api::serve(core, addr, shutdown).await
    })?;

    Ok(())
}
