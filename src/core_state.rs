//! Shared application state for the HTTP layer.
//!
//! `CoreState` is wrapped in `Arc` at startup and handed to every request.
//! It holds no open database handle: each request opens its own connection
//! via [`CoreState::open_db`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::media::{HttpImageHost, ImageHost, MediaError, MemoryImageHost};
use crate::session::SessionRegistry;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    /// Live bearer sessions and the auth-event stream.
    pub sessions: SessionRegistry,
    pub image_host: Arc<dyn ImageHost>,
}

impl CoreState {
    pub fn new(config: AppConfig, image_host: Arc<dyn ImageHost>) -> Self {
        let sessions = SessionRegistry::new(config.session_ttl);
        Self {
            config,
            sessions,
            image_host,
        }
    }

    /// Build state from configuration: pick the image host, create the data
    /// directory and bring the schema up to date.
    ///
    /// Must run outside an async context; the HTTP image host owns a
    /// blocking client.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let image_host: Arc<dyn ImageHost> = match &config.image_host {
            Some(host) => Arc::new(HttpImageHost::new(
                &host.endpoint,
                &host.upload_preset,
                host.timeout,
            )?),
            None => {
                tracing::warn!("No image host configured; profile images kept in memory");
                Arc::new(MemoryImageHost::new())
            }
        };

        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DataDir {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        // Opening runs migrations.
        db::open_database(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "Database ready");

        Ok(Self::new(config, image_host))
    }

    /// Open a fresh connection to the application database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Cannot create data directory {path:?}: {reason}")]
    DataDir { path: PathBuf, reason: String },
    #[error("Image host setup failed: {0}")]
    ImageHost(#[from] MediaError),
}
