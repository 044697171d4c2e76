//! API server lifecycle: bind, serve in the background, shut down.
//!
//! Pattern: bind → spawn background task → return handle with shutdown
//! channel. `main` uses [`serve`] directly with a ctrl-c signal instead.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind API server on {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },
    #[error("API server error: {0}")]
    Serve(String),
}

/// Metadata for a running server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub addr: SocketAddr,
    pub started_at: String,
}

/// Handle to a running API server.
pub struct ApiServer {
    pub info: ServerInfo,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
        addr,
        reason: e.to_string(),
    })
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F>(core: Arc<CoreState>, addr: SocketAddr, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(addr).await?;
    let local = listener
        .local_addr()
        .map_err(|e| ServerError::Serve(e.to_string()))?;
    run(listener, core, shutdown, local).await
}

async fn run<F>(
    listener: TcpListener,
    core: Arc<CoreState>,
    shutdown: F,
    addr: SocketAddr,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = api_router(core);
    tracing::info!(%addr, "API server started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| ServerError::Serve(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

/// Start the API server in a background task.
///
/// Port 0 binds an ephemeral port; the bound address is in the returned
/// handle's `info`.
pub async fn start_api_server(
    core: Arc<CoreState>,
    addr: SocketAddr,
) -> Result<ApiServer, ServerError> {
    let listener = bind(addr).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    let info = ServerInfo {
        addr,
        started_at: crate::db::format_timestamp(&crate::db::now_utc()),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };
        if let Err(e) = run(listener, core, shutdown_signal, addr).await {
            tracing::error!("{e}");
        }
    });

    Ok(ApiServer {
        info,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::media::MemoryImageHost;

    fn test_core(dir: &std::path::Path) -> Arc<CoreState> {
        let db_path = dir.join("care.db");
        let config = AppConfig::from_lookup(move |key| {
            (key == "NAIJACARE_DB_PATH").then(|| db_path.display().to_string())
        })
        .unwrap();
        Arc::new(CoreState::new(config, Arc::new(MemoryImageHost::new())))
    }

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start_api_server(test_core(dir.path()), loopback())
            .await
            .expect("server should start");
        assert!(server.info.addr.port() > 0);

        let url = format!("http://{}/api/health", server.info.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let url = format!("http://{}/api/appointments", server.info.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_api_server(test_core(dir.path()), loopback())
            .await
            .unwrap();
        let taken = server.info.addr;
        let result = start_api_server(test_core(dir.path()), taken).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn serve_returns_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(test_core(dir.path()), loopback(), async move {
            let _ = rx.await;
        }));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
