use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, now_utc};
use crate::db::DatabaseError;

/// Salted password verifier for one account. The plaintext is never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredential {
    pub account_id: Uuid,
    pub salt: Vec<u8>,
    pub password_hash: Vec<u8>,
}

pub fn upsert_credential(conn: &Connection, cred: &StoredCredential) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO credentials (account_id, salt, password_hash, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(account_id) DO UPDATE SET
            salt = excluded.salt,
            password_hash = excluded.password_hash,
            updated_at = excluded.updated_at",
        params![
            cred.account_id.to_string(),
            cred.salt,
            cred.password_hash,
            format_timestamp(&now_utc()),
        ],
    )?;
    Ok(())
}

pub fn get_credential(
    conn: &Connection,
    account_id: &Uuid,
) -> Result<Option<StoredCredential>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT salt, password_hash FROM credentials WHERE account_id = ?1",
            params![account_id.to_string()],
            |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )
        .optional()?;
    Ok(row.map(|(salt, password_hash)| StoredCredential {
        account_id: *account_id,
        salt,
        password_hash,
    }))
}
