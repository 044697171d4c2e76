use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{escape_like, format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const ACCOUNT_COLUMNS: &str = "id, role, name, email, phone, address, profile_image, facility_id,
     wallet_balance, nhis_number, created_at, version";

/// Raw column values, converted to `Account` outside the rusqlite closure so
/// enum and id parse failures surface as `DatabaseError`.
struct AccountRow {
    id: String,
    role: String,
    name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    profile_image: Option<String>,
    facility_id: Option<String>,
    wallet_balance: i64,
    nhis_number: Option<String>,
    created_at: String,
    version: i64,
}

fn read_account_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        role: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        profile_image: row.get(6)?,
        facility_id: row.get(7)?,
        wallet_balance: row.get(8)?,
        nhis_number: row.get(9)?,
        created_at: row.get(10)?,
        version: row.get(11)?,
    })
}

impl TryFrom<AccountRow> for Account {
    type Error = DatabaseError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: parse_uuid(&row.id)?,
            role: Role::from_str(&row.role)?,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            profile_image: row.profile_image,
            facility_id: row.facility_id.as_deref().map(parse_uuid).transpose()?,
            wallet_balance: row.wallet_balance,
            nhis_number: row.nhis_number,
            created_at: parse_timestamp(&row.created_at)?,
            version: row.version,
        })
    }
}

fn collect_accounts(
    rows: impl Iterator<Item = rusqlite::Result<AccountRow>>,
) -> Result<Vec<Account>, DatabaseError> {
    rows.map(|r| Account::try_from(r?)).collect()
}

pub fn insert_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (id, role, name, email, phone, address, profile_image, facility_id,
         wallet_balance, nhis_number, created_at, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            account.id.to_string(),
            account.role.as_str(),
            account.name,
            account.email,
            account.phone,
            account.address,
            account.profile_image,
            account.facility_id.map(|id| id.to_string()),
            account.wallet_balance,
            account.nhis_number,
            format_timestamp(&account.created_at),
            account.version,
        ],
    )?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &Uuid) -> Result<Option<Account>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![id.to_string()],
            read_account_row,
        )
        .optional()?;
    row.map(Account::try_from).transpose()
}

/// Like `get_account`, but a missing row is an error.
pub fn require_account(conn: &Connection, id: &Uuid) -> Result<Account, DatabaseError> {
    get_account(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Account".into(),
        id: id.to_string(),
    })
}

/// Email lookup is case-insensitive (column collates NOCASE).
pub fn get_account_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Account>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
            params![email.trim()],
            read_account_row,
        )
        .optional()?;
    row.map(Account::try_from).transpose()
}

/// Full scan with optional facility and role filters, newest first.
pub fn list_accounts(
    conn: &Connection,
    filter: &AccountFilter,
) -> Result<Vec<Account>, DatabaseError> {
    let mut sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(facility) = filter.facility_id {
        params_vec.push(Box::new(facility.to_string()));
        sql.push_str(&format!(" AND facility_id = ?{}", params_vec.len()));
    }
    if let Some(role) = filter.role {
        params_vec.push(Box::new(role.as_str()));
        sql.push_str(&format!(" AND role = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY created_at DESC, rowid DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), read_account_row)?;
    collect_accounts(rows)
}

/// Patients whose NHIS number contains `query`, case-insensitively.
pub fn search_patients_by_nhis(
    conn: &Connection,
    facility_id: Option<&Uuid>,
    query: &str,
) -> Result<Vec<Account>, DatabaseError> {
    let pattern = format!("%{}%", escape_like(query));
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts
         WHERE role = 'patient'
           AND nhis_number LIKE ?1 ESCAPE '\\'
           AND (?2 IS NULL OR facility_id = ?2)
         ORDER BY name"
    ))?;
    let rows = stmt.query_map(
        params![pattern, facility_id.map(|id| id.to_string())],
        read_account_row,
    )?;
    collect_accounts(rows)
}

/// Conditional write of the editable profile fields. Bumps `version`.
///
/// Returns the new version, or `VersionMismatch` when another writer got
/// there first.
pub fn update_account_profile(
    conn: &Connection,
    account: &Account,
    expected_version: i64,
) -> Result<i64, DatabaseError> {
    let updated = conn.execute(
        "UPDATE accounts SET name = ?1, phone = ?2, address = ?3, profile_image = ?4,
         version = version + 1
         WHERE id = ?5 AND version = ?6",
        params![
            account.name,
            account.phone,
            account.address,
            account.profile_image,
            account.id.to_string(),
            expected_version,
        ],
    )?;
    if updated == 0 {
        let found = require_account(conn, &account.id)?.version;
        return Err(DatabaseError::VersionMismatch {
            entity_type: "Account".into(),
            id: account.id.to_string(),
            expected: expected_version,
            found,
        });
    }
    Ok(expected_version + 1)
}

/// Server-side increment of the wallet balance. Returns the new balance.
pub fn adjust_wallet_balance(
    conn: &Connection,
    id: &Uuid,
    delta: i64,
) -> Result<i64, DatabaseError> {
    conn.query_row(
        "UPDATE accounts SET wallet_balance = wallet_balance + ?1 WHERE id = ?2
         RETURNING wallet_balance",
        params![delta, id.to_string()],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Account".into(),
        id: id.to_string(),
    })
}

pub fn admin_exists(conn: &Connection) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn nhis_number_exists(conn: &Connection, nhis_number: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE nhis_number = ?1",
        params![nhis_number],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_utc;
    use crate::db::sqlite::open_memory_database;

    fn make_account(role: Role, email: &str, facility: Option<Uuid>) -> Account {
        Account {
            id: Uuid::new_v4(),
            role,
            name: format!("{role} {email}"),
            email: email.into(),
            phone: Some("08030000000".into()),
            address: Some("12 Marina, Lagos".into()),
            profile_image: None,
            facility_id: facility,
            wallet_balance: 0,
            nhis_number: None,
            created_at: now_utc(),
            version: 1,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let account = make_account(Role::Patient, "ada@example.com", None);
        insert_account(&conn, &account).unwrap();

        let loaded = get_account(&conn, &account.id).unwrap().unwrap();
        assert_eq!(loaded, account);
    }

    #[test]
    fn get_missing_account_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_account(&conn, &Uuid::new_v4()).unwrap().is_none());
        assert!(matches!(
            require_account(&conn, &Uuid::new_v4()),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn email_is_unique_ignoring_case() {
        let conn = open_memory_database().unwrap();
        insert_account(&conn, &make_account(Role::Patient, "ada@example.com", None)).unwrap();
        let err = insert_account(&conn, &make_account(Role::Patient, "ADA@example.com", None))
            .unwrap_err();
        assert!(err.is_constraint_violation());

        let found = get_account_by_email(&conn, "Ada@Example.com").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn list_filters_by_facility_and_role() {
        let conn = open_memory_database().unwrap();
        let admin = make_account(Role::Admin, "admin@clinic.ng", None);
        insert_account(&conn, &admin).unwrap();
        insert_account(&conn, &make_account(Role::Patient, "p1@x.ng", Some(admin.id))).unwrap();
        insert_account(&conn, &make_account(Role::Doctor, "d1@x.ng", Some(admin.id))).unwrap();
        insert_account(&conn, &make_account(Role::Patient, "loner@x.ng", None)).unwrap();

        let all = list_accounts(&conn, &AccountFilter::default()).unwrap();
        assert_eq!(all.len(), 4);

        let scoped = list_accounts(
            &conn,
            &AccountFilter { facility_id: Some(admin.id), role: None },
        )
        .unwrap();
        assert_eq!(scoped.len(), 2);

        let patients = list_accounts(
            &conn,
            &AccountFilter { facility_id: Some(admin.id), role: Some(Role::Patient) },
        )
        .unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].email, "p1@x.ng");
    }

    #[test]
    fn stale_profile_write_is_rejected() {
        let conn = open_memory_database().unwrap();
        let mut account = make_account(Role::Patient, "ada@example.com", None);
        insert_account(&conn, &account).unwrap();

        account.phone = Some("0809".into());
        assert_eq!(update_account_profile(&conn, &account, 1).unwrap(), 2);

        account.phone = Some("0810".into());
        let err = update_account_profile(&conn, &account, 1).unwrap_err();
        assert!(matches!(err, DatabaseError::VersionMismatch { found: 2, .. }));
    }

    #[test]
    fn wallet_increment_returns_new_balance() {
        let conn = open_memory_database().unwrap();
        let account = make_account(Role::Patient, "ada@example.com", None);
        insert_account(&conn, &account).unwrap();

        assert_eq!(adjust_wallet_balance(&conn, &account.id, 5000).unwrap(), 5000);
        assert_eq!(adjust_wallet_balance(&conn, &account.id, -3000).unwrap(), 2000);
        assert!(matches!(
            adjust_wallet_balance(&conn, &Uuid::new_v4(), 1),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn nhis_search_is_case_insensitive_substring() {
        let conn = open_memory_database().unwrap();
        let mut patient = make_account(Role::Patient, "ada@example.com", None);
        patient.nhis_number = Some("NHISaB3xY".into());
        insert_account(&conn, &patient).unwrap();

        assert_eq!(search_patients_by_nhis(&conn, None, "ab3").unwrap().len(), 1);
        assert!(search_patients_by_nhis(&conn, None, "zzz").unwrap().is_empty());
        assert!(search_patients_by_nhis(&conn, None, "%").unwrap().is_empty());
        assert!(search_patients_by_nhis(&conn, Some(&Uuid::new_v4()), "ab3")
            .unwrap()
            .is_empty());
        assert!(nhis_number_exists(&conn, "NHISaB3xY").unwrap());
    }
}
