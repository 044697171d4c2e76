use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_date, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const TRANSACTION_COLUMNS: &str =
    "t.id, t.account_id, t.kind, t.method, t.amount, t.date, t.timestamp, t.appointment_id";

struct TransactionRow {
    id: String,
    account_id: String,
    kind: String,
    method: String,
    amount: i64,
    date: String,
    timestamp: String,
    appointment_id: Option<String>,
}

fn read_transaction_row(row: &Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok(TransactionRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        kind: row.get(2)?,
        method: row.get(3)?,
        amount: row.get(4)?,
        date: row.get(5)?,
        timestamp: row.get(6)?,
        appointment_id: row.get(7)?,
    })
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = DatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(WalletTransaction {
            id: parse_uuid(&row.id)?,
            account_id: parse_uuid(&row.account_id)?,
            kind: TransactionKind::from_str(&row.kind)?,
            method: PaymentMethod::from_str(&row.method)?,
            amount: row.amount,
            date: parse_date(&row.date)?,
            timestamp: parse_timestamp(&row.timestamp)?,
            appointment_id: row.appointment_id.as_deref().map(parse_uuid).transpose()?,
        })
    }
}

/// Append-only: transactions are never updated or deleted.
pub fn insert_transaction(conn: &Connection, tx: &WalletTransaction) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO wallet_transactions (id, account_id, kind, method, amount, date,
         timestamp, appointment_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tx.id.to_string(),
            tx.account_id.to_string(),
            tx.kind.as_str(),
            tx.method.as_str(),
            tx.amount,
            tx.date.to_string(),
            format_timestamp(&tx.timestamp),
            tx.appointment_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

/// One account's history, newest first.
pub fn list_account_transactions(
    conn: &Connection,
    account_id: &Uuid,
) -> Result<Vec<WalletTransaction>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions t
         WHERE t.account_id = ?1
         ORDER BY t.timestamp DESC, t.rowid DESC"
    ))?;
    let rows = stmt.query_map(params![account_id.to_string()], read_transaction_row)?;
    rows.map(|r| WalletTransaction::try_from(r?)).collect()
}

/// Transactions of every account in a facility (or all accounts when
/// `facility_id` is `None`), newest first.
pub fn list_transactions(
    conn: &Connection,
    facility_id: Option<&Uuid>,
) -> Result<Vec<WalletTransaction>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions t
         JOIN accounts a ON a.id = t.account_id
         WHERE (?1 IS NULL OR a.facility_id = ?1)
         ORDER BY t.timestamp DESC, t.rowid DESC"
    ))?;
    let rows = stmt.query_map(
        params![facility_id.map(|id| id.to_string())],
        read_transaction_row,
    )?;
    rows.map(|r| WalletTransaction::try_from(r?)).collect()
}

/// Signed sum of an account's transactions. Equals the stored balance when
/// the ledger is consistent.
pub fn sum_account_transactions(conn: &Connection, account_id: &Uuid) -> Result<i64, DatabaseError> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM wallet_transactions WHERE account_id = ?1",
        params![account_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(total)
}
