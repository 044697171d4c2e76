//! Audit logging middleware.
//!
//! Logs every API request with account id, method, path, status and
//! latency. Runs innermost (after auth has injected `AuthContext`).

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let caller = req
        .extensions()
        .get::<AuthContext>()
        .map(|auth| (auth.session.account_id.to_string(), auth.session.role.as_str()));
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let (account, role) = caller.unwrap_or_else(|| ("anonymous".to_string(), "-"));
    tracing::info!(
        target: "naijacare::audit",
        %method,
        %path,
        status,
        account = %account,
        role,
        elapsed_ms,
        "API access"
    );

    response
}
