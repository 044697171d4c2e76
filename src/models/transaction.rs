use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{PaymentMethod, TransactionKind};

/// One wallet balance movement. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub method: PaymentMethod,
    /// Positive for deposits, negative for payments.
    pub amount: i64,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub appointment_id: Option<Uuid>,
}
