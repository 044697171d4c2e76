//! Wallet ledger: deposits, withdrawals, appointment payments and balance
//! reconciliation.
//!
//! Every balance change and its transaction row are written in one SQLite
//! transaction, so the stored balance always equals the transaction sum.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use crate::authorization::require_account_access;
use crate::db::{self, now_utc};
use crate::error::CareError;
use crate::models::*;
use crate::session::Session;

/// Outcome of a balance-changing operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletReceipt {
    pub message: String,
    pub transaction: WalletTransaction,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletReconciliation {
    pub account_id: Uuid,
    pub stored_balance: i64,
    pub ledger_balance: i64,
    pub transaction_count: usize,
    pub consistent: bool,
}

/// Upper bound for a single wallet movement and for appointment prices.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

fn require_positive(amount: i64) -> Result<(), CareError> {
    if amount <= 0 {
        return Err(CareError::InvalidInput(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(CareError::InvalidInput(format!(
            "amount must not exceed ₦{MAX_AMOUNT}, got {amount}"
        )));
    }
    Ok(())
}

/// Takes the write lock before the balance is read; concurrent wallet
/// writers queue on `busy_timeout`.
fn begin_write(conn: &Connection) -> Result<Transaction<'_>, CareError> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

/// Only the wallet owner moves money.
fn require_owner(session: &Session, patient_id: &Uuid) -> Result<(), CareError> {
    let caller = session.require_patient()?;
    if &caller != patient_id {
        return Err(CareError::PermissionDenied(
            "only the wallet owner can move funds".into(),
        ));
    }
    Ok(())
}

/// Apply `delta` to the balance and append the matching transaction.
/// Caller owns the surrounding SQLite transaction.
fn record(
    conn: &Connection,
    account_id: &Uuid,
    kind: TransactionKind,
    method: PaymentMethod,
    delta: i64,
    appointment_id: Option<Uuid>,
) -> Result<(WalletTransaction, i64), CareError> {
    let current = db::require_account(conn, account_id)?.wallet_balance;
    if current.checked_add(delta).is_none() {
        return Err(CareError::InvalidInput(
            "wallet balance would exceed the supported range".into(),
        ));
    }
    let balance = db::adjust_wallet_balance(conn, account_id, delta)?;
    let timestamp = now_utc();
    let transaction = WalletTransaction {
        id: Uuid::new_v4(),
        account_id: *account_id,
        kind,
        method,
        amount: delta,
        date: timestamp.date_naive(),
        timestamp,
        appointment_id,
    };
    db::insert_transaction(conn, &transaction)?;
    Ok((transaction, balance))
}

/// Check the balance for wallet-funded withdrawals. External rails settle
/// elsewhere and skip the check.
fn check_funds(conn: &Connection, patient_id: &Uuid, amount: i64, method: PaymentMethod) -> Result<(), CareError> {
    if method.is_external() {
        return Ok(());
    }
    let balance = db::require_account(conn, patient_id)?.wallet_balance;
    if balance < amount {
        tracing::info!(
            account_id = %patient_id,
            balance,
            required = amount,
            "Wallet payment refused: insufficient funds"
        );
        return Err(CareError::InsufficientFunds {
            balance,
            required: amount,
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Mutations
// ═══════════════════════════════════════════════════════════

/// Top up a wallet from card or blockchain.
pub fn deposit(
    conn: &Connection,
    session: &Session,
    patient_id: &Uuid,
    amount: i64,
    method: PaymentMethod,
) -> Result<WalletReceipt, CareError> {
    require_owner(session, patient_id)?;
    require_positive(amount)?;
    if !method.is_external() {
        return Err(CareError::InvalidInput(
            "deposits must come from card or blockchain".into(),
        ));
    }

    let tx = begin_write(conn)?;
    let (transaction, balance) =
        record(&tx, patient_id, TransactionKind::Deposit, method, amount, None)?;
    tx.commit()?;

    tracing::info!(
        account_id = %patient_id,
        amount,
        method = %method,
        balance,
        "Wallet deposit"
    );
    Ok(WalletReceipt {
        message: format!("Deposit of ₦{amount} via {method} successful"),
        transaction,
        balance,
    })
}

/// Spend from a wallet. `Wallet` requires enough stored balance.
pub fn withdraw(
    conn: &Connection,
    session: &Session,
    patient_id: &Uuid,
    amount: i64,
    method: PaymentMethod,
) -> Result<WalletReceipt, CareError> {
    require_owner(session, patient_id)?;
    require_positive(amount)?;

    let tx = begin_write(conn)?;
    check_funds(&tx, patient_id, amount, method)?;
    let (transaction, balance) =
        record(&tx, patient_id, TransactionKind::Payment, method, -amount, None)?;
    tx.commit()?;

    tracing::info!(
        account_id = %patient_id,
        amount,
        method = %method,
        balance,
        "Wallet payment"
    );
    Ok(WalletReceipt {
        message: format!("Payment of ₦{amount} via {method} successful"),
        transaction,
        balance,
    })
}

/// Settle an appointment: withdraw its amount and mark it paid, atomically.
pub fn pay_appointment(
    conn: &Connection,
    session: &Session,
    appointment_id: &Uuid,
    method: PaymentMethod,
) -> Result<WalletReceipt, CareError> {
    let patient_id = session.require_patient()?;

    let tx = begin_write(conn)?;
    let mut appointment = db::get_patient_appointment(&tx, &patient_id, appointment_id)?;
    if appointment.payment_status == PaymentStatus::Paid {
        return Err(CareError::InvalidInput("appointment is already paid".into()));
    }
    if appointment.status == AppointmentStatus::Cancelled {
        return Err(CareError::InvalidInput(
            "cancelled appointments cannot be paid".into(),
        ));
    }
    let amount = appointment.amount;
    if amount <= 0 {
        return Err(CareError::InvalidInput(
            "appointment has no amount to pay yet".into(),
        ));
    }

    check_funds(&tx, &patient_id, amount, method)?;
    let (transaction, balance) = record(
        &tx,
        &patient_id,
        TransactionKind::Payment,
        method,
        -amount,
        Some(appointment.id),
    )?;

    let expected = appointment.version;
    appointment.payment_status = PaymentStatus::Paid;
    appointment.updated_at = now_utc();
    db::update_appointment(&tx, &appointment, expected)?;
    tx.commit()?;

    tracing::info!(
        account_id = %patient_id,
        appointment_id = %appointment_id,
        amount,
        method = %method,
        balance,
        "Appointment paid"
    );
    Ok(WalletReceipt {
        message: format!("Payment of ₦{amount} for appointment on {} successful", appointment.date),
        transaction,
        balance,
    })
}

// ═══════════════════════════════════════════════════════════
// Reads
// ═══════════════════════════════════════════════════════════

/// Transaction history, newest first. Readable by the owner and the
/// facility administrator.
pub fn list_transactions(
    conn: &Connection,
    session: &Session,
    patient_id: &Uuid,
) -> Result<Vec<WalletTransaction>, CareError> {
    let account = db::require_account(conn, patient_id)?;
    require_account_access(session, &account)?;
    Ok(db::list_account_transactions(conn, patient_id)?)
}

/// Compare the stored balance with the sum of the transaction history.
pub fn reconcile_wallet(
    conn: &Connection,
    session: &Session,
    patient_id: &Uuid,
) -> Result<WalletReconciliation, CareError> {
    let account = db::require_account(conn, patient_id)?;
    require_account_access(session, &account)?;

    let transactions = db::list_account_transactions(conn, patient_id)?;
    let ledger_balance = db::sum_account_transactions(conn, patient_id)?;
    let consistent = ledger_balance == account.wallet_balance;
    if !consistent {
        tracing::warn!(
            account_id = %patient_id,
            stored = account.wallet_balance,
            ledger = ledger_balance,
            "Wallet balance drift detected"
        );
    }
    Ok(WalletReconciliation {
        account_id: account.id,
        stored_balance: account.wallet_balance,
        ledger_balance,
        transaction_count: transactions.len(),
        consistent,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::appointment::{admin_update_appointment, book_appointment};
    use crate::db::open_memory_database;
    use crate::test_support::*;

    fn book(conn: &Connection, patient: &Account) -> Appointment {
        book_appointment(
            conn,
            &session_for(patient),
            BookingRequest {
                appointment_type: AppointmentType::Virtual,
                date: NaiveDate::from_ymd_opt(2025, 5, 20),
                time: Some("11:00".into()),
                message: "Blood pressure review".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn deposit_then_withdraw_is_symmetric() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);

        let dep = deposit(&conn, &session, &patient.id, 7500, PaymentMethod::Card).unwrap();
        assert_eq!(dep.balance, 7500);
        let wd = withdraw(&conn, &session, &patient.id, 7500, PaymentMethod::Wallet).unwrap();
        assert_eq!(wd.balance, 0);
        assert_eq!(wd.transaction.amount, -7500);
        assert_eq!(reload(&conn, &patient).wallet_balance, 0);
        assert_eq!(list_transactions(&conn, &session, &patient.id).unwrap().len(), 2);
    }

    #[test]
    fn non_positive_amounts_change_nothing() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);

        for amount in [0, -50] {
            assert!(matches!(
                deposit(&conn, &session, &patient.id, amount, PaymentMethod::Card),
                Err(CareError::InvalidInput(_))
            ));
            assert!(matches!(
                withdraw(&conn, &session, &patient.id, amount, PaymentMethod::Wallet),
                Err(CareError::InvalidInput(_))
            ));
        }
        assert_eq!(reload(&conn, &patient).wallet_balance, 0);
        assert!(list_transactions(&conn, &session, &patient.id).unwrap().is_empty());
    }

    #[test]
    fn wallet_deposit_method_is_rejected() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        assert!(matches!(
            deposit(&conn, &session_for(&patient), &patient.id, 100, PaymentMethod::Wallet),
            Err(CareError::InvalidInput(_))
        ));
    }

    #[test]
    fn insufficient_funds_only_for_wallet_method() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);
        deposit(&conn, &session, &patient.id, 1000, PaymentMethod::Blockchain).unwrap();

        let err = withdraw(&conn, &session, &patient.id, 1500, PaymentMethod::Wallet).unwrap_err();
        assert!(matches!(err, CareError::InsufficientFunds { balance: 1000, required: 1500 }));
        assert_eq!(reload(&conn, &patient).wallet_balance, 1000);

        let card = withdraw(&conn, &session, &patient.id, 1500, PaymentMethod::Card).unwrap();
        assert_eq!(card.balance, -500);
        assert_eq!(card.transaction.method, PaymentMethod::Card);
    }

    #[test]
    fn only_owner_moves_money() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let other = seed_patient(&conn, &admin);

        assert!(matches!(
            deposit(&conn, &session_for(&other), &patient.id, 100, PaymentMethod::Card),
            Err(CareError::PermissionDenied(_))
        ));
        assert!(matches!(
            deposit(&conn, &session_for(&admin), &patient.id, 100, PaymentMethod::Card),
            Err(CareError::PermissionDenied(_))
        ));
    }

    #[test]
    fn facility_admin_can_read_history() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let other = seed_other_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        deposit(&conn, &session_for(&patient), &patient.id, 200, PaymentMethod::Card).unwrap();

        assert_eq!(list_transactions(&conn, &session_for(&admin), &patient.id).unwrap().len(), 1);
        assert!(matches!(
            list_transactions(&conn, &session_for(&other), &patient.id),
            Err(CareError::PermissionDenied(_))
        ));
    }

    #[test]
    fn deposit_book_confirm_pay_scenario() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);
        assert_eq!(patient.wallet_balance, 0);

        let receipt = deposit(&conn, &session, &patient.id, 5000, PaymentMethod::Card).unwrap();
        assert_eq!(receipt.balance, 5000);
        let history = list_transactions(&conn, &session, &patient.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Deposit);
        assert_eq!(history[0].amount, 5000);

        let appt = book(&conn, &patient);
        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(appt.payment_status, PaymentStatus::Unpaid);

        admin_update_appointment(
            &conn,
            &session_for(&admin),
            &patient.id,
            &appt.id,
            AppointmentUpdate {
                status: Some(AppointmentStatus::Confirmed),
                amount: Some(3000),
                ..Default::default()
            },
        )
        .unwrap();

        let paid = pay_appointment(&conn, &session, &appt.id, PaymentMethod::Wallet).unwrap();
        assert_eq!(paid.balance, 2000);
        assert_eq!(paid.transaction.amount, -3000);
        assert_eq!(paid.transaction.appointment_id, Some(appt.id));
        assert_eq!(reload(&conn, &patient).wallet_balance, 2000);

        let history = list_transactions(&conn, &session, &patient.id).unwrap();
        let payments: Vec<_> = history.iter().filter(|t| t.kind == TransactionKind::Payment).collect();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, -3000);

        let stored = db::get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert!(reconcile_wallet(&conn, &session, &patient.id).unwrap().consistent);
    }

    #[test]
    fn failed_payment_leaves_everything_untouched() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);
        let appt = book(&conn, &patient);
        admin_update_appointment(
            &conn,
            &session_for(&admin),
            &patient.id,
            &appt.id,
            AppointmentUpdate { amount: Some(3000), ..Default::default() },
        )
        .unwrap();

        assert!(matches!(
            pay_appointment(&conn, &session, &appt.id, PaymentMethod::Wallet),
            Err(CareError::InsufficientFunds { .. })
        ));
        let stored = db::get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Unpaid);
        assert!(list_transactions(&conn, &session, &patient.id).unwrap().is_empty());
    }

    #[test]
    fn cannot_pay_twice_or_pay_nothing() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);
        let appt = book(&conn, &patient);

        assert!(matches!(
            pay_appointment(&conn, &session, &appt.id, PaymentMethod::Card),
            Err(CareError::InvalidInput(_))
        ));

        admin_update_appointment(
            &conn,
            &session_for(&admin),
            &patient.id,
            &appt.id,
            AppointmentUpdate { amount: Some(800), ..Default::default() },
        )
        .unwrap();
        pay_appointment(&conn, &session, &appt.id, PaymentMethod::Card).unwrap();
        assert!(matches!(
            pay_appointment(&conn, &session, &appt.id, PaymentMethod::Card),
            Err(CareError::InvalidInput(_))
        ));
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);

        for amount in [MAX_AMOUNT + 1, i64::MAX] {
            assert!(matches!(
                deposit(&conn, &session, &patient.id, amount, PaymentMethod::Card),
                Err(CareError::InvalidInput(_))
            ));
        }
        assert_eq!(reload(&conn, &patient).wallet_balance, 0);
        deposit(&conn, &session, &patient.id, MAX_AMOUNT, PaymentMethod::Card).unwrap();
    }

    #[test]
    fn balance_overflow_is_invalid_input() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);
        db::adjust_wallet_balance(&conn, &patient.id, i64::MAX - 10).unwrap();

        let err = deposit(&conn, &session, &patient.id, 100, PaymentMethod::Card).unwrap_err();
        assert!(matches!(err, CareError::InvalidInput(_)));
        assert_eq!(reload(&conn, &patient).wallet_balance, i64::MAX - 10);
        assert!(list_transactions(&conn, &session, &patient.id).unwrap().is_empty());
    }

    #[test]
    fn wallet_writes_serialize_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("care.db");
        let conn = db::open_database(&path).unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);
        deposit(&conn, &session, &patient.id, 1000, PaymentMethod::Card).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let session = session.clone();
                let id = patient.id;
                std::thread::spawn(move || {
                    let conn = db::open_database(&path).unwrap();
                    withdraw(&conn, &session, &id, 100, PaymentMethod::Wallet)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(reload(&conn, &patient).wallet_balance, 600);
        assert!(reconcile_wallet(&conn, &session, &patient.id).unwrap().consistent);
    }

    #[test]
    fn reconciliation_reports_drift() {
        let conn = open_memory_database().unwrap();
        let admin = seed_admin(&conn);
        let patient = seed_patient(&conn, &admin);
        let session = session_for(&patient);
        deposit(&conn, &session, &patient.id, 400, PaymentMethod::Card).unwrap();

        let clean = reconcile_wallet(&conn, &session, &patient.id).unwrap();
        assert!(clean.consistent);
        assert_eq!(clean.transaction_count, 1);

        db::adjust_wallet_balance(&conn, &patient.id, 50).unwrap();
        let drift = reconcile_wallet(&conn, &session_for(&admin), &patient.id).unwrap();
        assert!(!drift.consistent);
        assert_eq!(drift.stored_balance, 450);
        assert_eq!(drift.ledger_balance, 400);
    }
}
