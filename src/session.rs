//! Password credentials, bearer sessions and the auth-state event stream.
//!
//! Every directory and ledger call takes a `&Session` resolved from a bearer
//! token; nothing reads "the current user" from global state.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::broadcast;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::db::{self, StoredCredential};
use crate::error::CareError;
use crate::models::{Account, Role};

#[cfg(not(test))]
pub const PBKDF2_ITERATIONS: u32 = 600_000;
#[cfg(test)]
pub const PBKDF2_ITERATIONS: u32 = 1_000;

pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Default session lifetime: 12 hours.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

/// The verified caller of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub account_id: Uuid,
    pub role: Role,
    pub email: String,
    /// Owning facility of the account (`None` for administrators and
    /// self-registered patients). See [`Session::facility`].
    pub facility_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn for_account(account: &Account) -> Self {
        Self {
            account_id: account.id,
            role: account.role,
            email: account.email.clone(),
            facility_id: account.facility_id,
            issued_at: db::now_utc(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The facility this caller acts for. An administrator's facility is its
    /// own account id.
    pub fn facility(&self) -> Option<Uuid> {
        match self.role {
            Role::Admin => Some(self.account_id),
            _ => self.facility_id,
        }
    }

    /// Facility id of an administrator, or `PermissionDenied`.
    pub fn require_admin(&self) -> Result<Uuid, CareError> {
        if self.is_admin() {
            Ok(self.account_id)
        } else {
            Err(CareError::PermissionDenied(
                "administrator session required".into(),
            ))
        }
    }

    pub fn require_patient(&self) -> Result<Uuid, CareError> {
        if self.role == Role::Patient {
            Ok(self.account_id)
        } else {
            Err(CareError::PermissionDenied("patient session required".into()))
        }
    }
}

/// Auth-state change notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn { account_id: Uuid, role: Role },
    SignedOut { account_id: Uuid },
}

// ═══════════════════════════════════════════════════════════
// Password credentials
// ═══════════════════════════════════════════════════════════

fn derive_hash(password: &str, salt: &[u8]) -> Zeroizing<[u8; HASH_LENGTH]> {
    let mut out = Zeroizing::new([0u8; HASH_LENGTH]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, out.as_mut_slice());
    out
}

fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

pub fn validate_password(password: &str) -> Result<(), CareError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CareError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Salt and hash `password` for `account_id`.
pub fn hash_password(account_id: Uuid, password: &str) -> StoredCredential {
    let salt = generate_salt();
    let hash = derive_hash(password, &salt);
    StoredCredential {
        account_id,
        salt: salt.to_vec(),
        password_hash: hash.to_vec(),
    }
}

/// Constant-time comparison against the stored verifier.
pub fn verify_password(cred: &StoredCredential, password: &str) -> bool {
    let candidate = derive_hash(password, &cred.salt);
    candidate.as_slice().ct_eq(cred.password_hash.as_slice()).into()
}

/// Validate and store sign-in credentials for an account.
pub fn set_password(conn: &Connection, account_id: Uuid, password: &str) -> Result<(), CareError> {
    validate_password(password)?;
    db::upsert_credential(conn, &hash_password(account_id, password))?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Bearer tokens
// ═══════════════════════════════════════════════════════════

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// ═══════════════════════════════════════════════════════════
// SessionRegistry
// ═══════════════════════════════════════════════════════════

struct SessionEntry {
    session: Session,
    expires_at: Instant,
}

/// In-memory table of live sessions keyed by token hash. Tokens themselves
/// are never stored.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<[u8; 32], SessionEntry>>,
    ttl: Duration,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<[u8; 32], SessionEntry>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<[u8; 32], SessionEntry>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Verify email and password, then issue a bearer token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn sign_in(
        &self,
        conn: &Connection,
        email: &str,
        password: &str,
    ) -> Result<(String, Session), CareError> {
        let account = db::get_account_by_email(conn, email)?;
        let Some(account) = account else {
            tracing::info!("Sign-in rejected: unknown email");
            return Err(CareError::NotAuthenticated);
        };
        let verified = db::get_credential(conn, &account.id)?
            .map(|cred| verify_password(&cred, password))
            .unwrap_or(false);
        if !verified {
            tracing::info!(account_id = %account.id, "Sign-in rejected: bad password");
            return Err(CareError::NotAuthenticated);
        }

        let session = Session::for_account(&account);
        let token = self.issue(session.clone());
        Ok((token, session))
    }

    /// Register a session and return its bearer token.
    pub fn issue(&self, session: Session) -> String {
        let token = generate_token();
        let event = AuthEvent::SignedIn {
            account_id: session.account_id,
            role: session.role,
        };
        {
            let mut sessions = self.write();
            let now = Instant::now();
            sessions.retain(|_, entry| entry.expires_at > now);
            sessions.insert(
                hash_token(&token),
                SessionEntry {
                    session,
                    expires_at: now + self.ttl,
                },
            );
        }
        // No receivers is fine.
        let _ = self.events.send(event);
        token
    }

    /// Look up the session behind a bearer token.
    pub fn resolve(&self, token: &str) -> Result<Session, CareError> {
        let sessions = self.read();
        match sessions.get(&hash_token(token)) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.session.clone()),
            _ => Err(CareError::NotAuthenticated),
        }
    }

    /// End a session. Returns `false` if the token was not live.
    pub fn sign_out(&self, token: &str) -> bool {
        let removed = self.write().remove(&hash_token(token));
        match removed {
            Some(entry) => {
                let _ = self.events.send(AuthEvent::SignedOut {
                    account_id: entry.session.account_id,
                });
                true
            }
            None => false,
        }
    }

    /// Stream of sign-in / sign-out events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.read().values().filter(|e| e.expires_at > now).count()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
