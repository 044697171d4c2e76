//! HTTP API for the care service.
//!
//! Routes are nested under `/api/`. Protected routes run behind the
//! middleware stack Rate Limit → Auth → Audit → Handler; sign-in,
//! registration, bootstrap and health are rate-limited only.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve, start_api_server, ApiServer, ServerError, ServerInfo};
pub use types::ApiContext;
