//! Account directory endpoints.
//!
//! - `GET /api/accounts` — facility accounts, optional `role` filter
//! - `POST /api/accounts` — admin creates a patient or doctor
//! - `GET /api/accounts/search?q=` — NHIS number search
//! - `GET /api/accounts/:id`
//! - `PATCH /api/accounts/:id` — owner profile edit
//! - `PUT /api/accounts/:id/profile-image?file_name=` — raw image body
//! - `GET /api/accounts/:id/overview` — appointment counts
//! - `POST /api/admin/facilities` — admin provisions another facility's administrator

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, JsonBody};
use crate::models::{Account, AccountFilter, NewAccount, NewAdministrator, ProfileUpdate, Role};
use crate::reporting::{self, PatientOverview};
use crate::{directory, media};

#[derive(Serialize)]
pub struct AccountResponse {
    pub account: Account,
}

#[derive(Serialize)]
pub struct AccountsResponse {
    pub accounts: Vec<Account>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub role: Option<Role>,
}

/// `GET /api/accounts`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let filter = AccountFilter {
        facility_id: None,
        role: query.role,
    };
    let accounts = ctx
        .with_db(move |_, conn| directory::list_accounts(conn, &auth.session, filter))
        .await?;
    Ok(Json(AccountsResponse { accounts }))
}

/// `POST /api/accounts`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(input): JsonBody<NewAccount>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = ctx
        .with_db(move |_, conn| directory::create_account(conn, &auth.session, input))
        .await?;
    Ok((StatusCode::CREATED, Json(AccountResponse { account })))
}

/// `POST /api/admin/facilities`
pub async fn create_facility_admin(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(input): JsonBody<NewAdministrator>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = ctx
        .with_db(move |_, conn| directory::create_facility_admin(conn, &auth.session, input))
        .await?;
    Ok((StatusCode::CREATED, Json(AccountResponse { account })))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/accounts/search?q=`
pub async fn search(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let accounts = ctx
        .with_db(move |_, conn| directory::search_patients(conn, &auth.session, &query.q))
        .await?;
    Ok(Json(AccountsResponse { accounts }))
}

/// `GET /api/accounts/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = ctx
        .with_db(move |_, conn| directory::get_account(conn, &auth.session, &id))
        .await?;
    Ok(Json(AccountResponse { account }))
}

/// `PATCH /api/accounts/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = ctx
        .with_db(move |_, conn| directory::update_profile(conn, &auth.session, &id, update))
        .await?;
    Ok(Json(AccountResponse { account }))
}

#[derive(Deserialize)]
pub struct ImageQuery {
    pub file_name: String,
}

/// `PUT /api/accounts/:id/profile-image?file_name=avatar.png`
pub async fn upload_image(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<ImageQuery>,
    body: Bytes,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = ctx
        .with_db(move |core, conn| {
            media::upload_profile_image(
                conn,
                &auth.session,
                core.image_host.as_ref(),
                &id,
                &body,
                &query.file_name,
            )
        })
        .await?;
    Ok(Json(AccountResponse { account }))
}

#[derive(Serialize)]
pub struct OverviewResponse {
    pub overview: PatientOverview,
}

/// `GET /api/accounts/:id/overview`
pub async fn overview(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<OverviewResponse>, ApiError> {
    let overview = ctx
        .with_db(move |_, conn| reporting::load_patient_overview(conn, &auth.session, &id))
        .await?;
    Ok(Json(OverviewResponse { overview }))
}
