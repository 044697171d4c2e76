//! Authentication endpoints.
//!
//! - `POST /api/auth/sign-in` — email + password → bearer token
//! - `POST /api/auth/register` — patient self-registration
//! - `POST /api/auth/bootstrap` — first administrator
//! - `POST /api/auth/sign-out` — revoke the presented token
//! - `GET /api/auth/session` — current session and account

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, JsonBody};
use crate::directory;
use crate::models::{Account, Registration};
use crate::session::Session;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub session: Session,
}

/// `POST /api/auth/sign-in`
pub async fn sign_in(
    State(ctx): State<ApiContext>,
    JsonBody(request): JsonBody<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    let (token, session) = ctx
        .with_db(move |core, conn| {
            core.sessions
                .sign_in(conn, &request.email, &request.password)
        })
        .await?;
    Ok(Json(SignInResponse { token, session }))
}

#[derive(Serialize)]
pub struct AccountResponse {
    pub account: Account,
}

/// `POST /api/auth/register` — creates a patient account in the chosen facility.
pub async fn register(
    State(ctx): State<ApiContext>,
    JsonBody(registration): JsonBody<Registration>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = ctx
        .with_db(move |_, conn| directory::register_patient(conn, registration))
        .await?;
    Ok((StatusCode::CREATED, Json(AccountResponse { account })))
}

#[derive(Deserialize)]
pub struct BootstrapRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/bootstrap` — only succeeds while no administrator exists.
pub async fn bootstrap(
    State(ctx): State<ApiContext>,
    JsonBody(request): JsonBody<BootstrapRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = ctx
        .with_db(move |_, conn| {
            directory::bootstrap_admin(conn, &request.name, &request.email, &request.password)
        })
        .await?;
    tracing::info!(account_id = %account.id, "Administrator bootstrapped");
    Ok((StatusCode::CREATED, Json(AccountResponse { account })))
}

/// `POST /api/auth/sign-out`
pub async fn sign_out(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> StatusCode {
    ctx.core.sessions.sign_out(&auth.token);
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session: Session,
    pub account: Account,
}

/// `GET /api/auth/session`
pub async fn current(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = auth.session;
    let account = {
        let session = session.clone();
        ctx.with_db(move |_, conn| directory::get_account(conn, &session, &session.account_id))
            .await?
    };
    Ok(Json(SessionResponse { session, account }))
}
