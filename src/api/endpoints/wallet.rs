//! Wallet endpoints.
//!
//! - `GET /api/accounts/:id/transactions` — newest first
//! - `GET /api/accounts/:id/wallet/reconcile` — balance vs ledger check
//! - `POST /api/accounts/:id/wallet/deposit`
//! - `POST /api/accounts/:id/wallet/withdraw`
//! - `POST /api/appointments/:id/pay`

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, JsonBody};
use crate::models::{PaymentMethod, WalletTransaction};
use crate::wallet::{self, WalletReceipt, WalletReconciliation};

#[derive(Deserialize)]
pub struct MovementRequest {
    pub amount: i64,
    pub method: PaymentMethod,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
}

#[derive(Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<WalletTransaction>,
}

/// `GET /api/accounts/:id/transactions`
pub async fn transactions(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let transactions = ctx
        .with_db(move |_, conn| wallet::list_transactions(conn, &auth.session, &id))
        .await?;
    Ok(Json(TransactionsResponse { transactions }))
}

/// `GET /api/accounts/:id/wallet/reconcile`
pub async fn reconcile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<WalletReconciliation>, ApiError> {
    let report = ctx
        .with_db(move |_, conn| wallet::reconcile_wallet(conn, &auth.session, &id))
        .await?;
    if !report.consistent {
        tracing::warn!(
            account_id = %report.account_id,
            stored = report.stored_balance,
            ledger = report.ledger_balance,
            "Wallet balance does not match ledger"
        );
    }
    Ok(Json(report))
}

/// `POST /api/accounts/:id/wallet/deposit`
pub async fn deposit(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<MovementRequest>,
) -> Result<Json<WalletReceipt>, ApiError> {
    let receipt = ctx
        .with_db(move |_, conn| {
            wallet::deposit(conn, &auth.session, &id, request.amount, request.method)
        })
        .await?;
    Ok(Json(receipt))
}

/// `POST /api/accounts/:id/wallet/withdraw`
pub async fn withdraw(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<MovementRequest>,
) -> Result<Json<WalletReceipt>, ApiError> {
    let receipt = ctx
        .with_db(move |_, conn| {
            wallet::withdraw(conn, &auth.session, &id, request.amount, request.method)
        })
        .await?;
    Ok(Json(receipt))
}

/// `POST /api/appointments/:id/pay`
pub async fn pay(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<PaymentRequest>,
) -> Result<Json<WalletReceipt>, ApiError> {
    let receipt = ctx
        .with_db(move |_, conn| wallet::pay_appointment(conn, &auth.session, &id, request.method))
        .await?;
    Ok(Json(receipt))
}
