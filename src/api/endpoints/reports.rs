//! Administrator dashboard endpoints.
//!
//! - `GET /api/admin/stats` — facility counts and revenue
//! - `GET /api/admin/activity?limit=` — recent events, newest first

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::reporting::{self, ActivityEvent, AdminStats};

const DEFAULT_ACTIVITY_LIMIT: usize = 10;

/// `GET /api/admin/stats`
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AdminStats>, ApiError> {
    let stats = ctx
        .with_db(move |_, conn| reporting::admin_stats(conn, &auth.session))
        .await?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ActivityResponse {
    pub events: Vec<ActivityEvent>,
}

/// `GET /api/admin/activity`
pub async fn activity(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ActivityResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    let events = ctx
        .with_db(move |_, conn| reporting::admin_activity(conn, &auth.session, limit))
        .await?;
    Ok(Json(ActivityResponse { events }))
}
