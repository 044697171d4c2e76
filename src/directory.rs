//! Account directory: creation, lookup, facility listings, NHIS search and
//! owner profile edits.

use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{require_account_access, resolve_facility_scope};
use crate::db::{self, now_utc};
use crate::error::CareError;
use crate::models::*;
use crate::session::{self, Session};

/// Prefix of every generated NHIS number.
pub const NHIS_PREFIX: &str = "NHIS";
const NHIS_SUFFIX_LENGTH: usize = 5;
const NHIS_MAX_ATTEMPTS: usize = 16;

/// Shorter NHIS queries match too broadly and return nothing.
pub const MIN_NHIS_QUERY_LENGTH: usize = 3;

// ═══════════════════════════════════════════════════════════
// Validation helpers
// ═══════════════════════════════════════════════════════════

fn required(field: &str, value: &str) -> Result<String, CareError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CareError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_email(email: &str) -> Result<String, CareError> {
    let email = required("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(CareError::InvalidInput(format!("invalid email address: {email}"))),
    }
}

/// Blank optional strings are stored as absent.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ensure_email_free(conn: &Connection, email: &str) -> Result<(), CareError> {
    if db::get_account_by_email(conn, email)?.is_some() {
        return Err(CareError::Conflict(format!("email already registered: {email}")));
    }
    Ok(())
}

/// `NHIS` followed by five random letters or digits, unique across accounts.
pub fn generate_nhis_number(conn: &Connection) -> Result<String, CareError> {
    let mut rng = rand::thread_rng();
    for _ in 0..NHIS_MAX_ATTEMPTS {
        let suffix: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(NHIS_SUFFIX_LENGTH)
            .map(char::from)
            .collect();
        let candidate = format!("{NHIS_PREFIX}{suffix}");
        if !db::nhis_number_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(CareError::Conflict("could not allocate a unique NHIS number".into()))
}

// ═══════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════

/// Administrator creates a patient or doctor under their own facility.
pub fn create_account(
    conn: &Connection,
    session: &Session,
    input: NewAccount,
) -> Result<Account, CareError> {
    let facility = session.require_admin()?;
    if input.role == Role::Admin {
        return Err(CareError::PermissionDenied(
            "administrators cannot create administrator accounts".into(),
        ));
    }
    let name = required("name", &input.name)?;
    let email = validate_email(&input.email)?;
    session::validate_password(&input.password)?;

    let tx = conn.unchecked_transaction()?;
    let id = input.id.unwrap_or_else(Uuid::new_v4);
    if db::get_account(&tx, &id)?.is_some() {
        return Err(CareError::Conflict(format!("account {id} already exists")));
    }
    ensure_email_free(&tx, &email)?;

    let nhis_number = match input.role {
        Role::Patient => Some(generate_nhis_number(&tx)?),
        _ => None,
    };
    let account = Account {
        id,
        role: input.role,
        name,
        email,
        phone: optional(input.phone),
        address: optional(input.address),
        profile_image: optional(input.profile_image),
        facility_id: Some(facility),
        wallet_balance: 0,
        nhis_number,
        created_at: now_utc(),
        version: 1,
    };
    db::insert_account(&tx, &account)?;
    session::set_password(&tx, account.id, &input.password)?;
    tx.commit()?;

    tracing::info!(
        account_id = %account.id,
        role = %account.role,
        facility = %facility,
        "Account created"
    );
    Ok(account)
}

/// Facility a self-registering patient joins: the named administrator, or
/// the only one when none is named.
fn registration_facility(conn: &Connection, requested: Option<Uuid>) -> Result<Uuid, CareError> {
    if let Some(id) = requested {
        return match db::get_account(conn, &id)? {
            Some(account) if account.role == Role::Admin => Ok(id),
            _ => Err(CareError::InvalidInput(format!("unknown facility: {id}"))),
        };
    }
    let admins = db::list_accounts(
        conn,
        &AccountFilter {
            facility_id: None,
            role: Some(Role::Admin),
        },
    )?;
    match admins.as_slice() {
        [only] => Ok(only.id),
        [] => Err(CareError::InvalidInput(
            "no facility is accepting registrations yet".into(),
        )),
        _ => Err(CareError::InvalidInput("facility_id is required".into())),
    }
}

/// Self-registration. Produces a patient of the chosen facility.
pub fn register_patient(conn: &Connection, input: Registration) -> Result<Account, CareError> {
    let name = required("name", &input.name)?;
    let email = validate_email(&input.email)?;
    session::validate_password(&input.password)?;

    let tx = conn.unchecked_transaction()?;
    let facility = registration_facility(&tx, input.facility_id)?;
    ensure_email_free(&tx, &email)?;
    let account = Account {
        id: Uuid::new_v4(),
        role: Role::Patient,
        name,
        email,
        phone: optional(input.phone),
        address: optional(input.address),
        profile_image: None,
        facility_id: Some(facility),
        wallet_balance: 0,
        nhis_number: Some(generate_nhis_number(&tx)?),
        created_at: now_utc(),
        version: 1,
    };
    db::insert_account(&tx, &account)?;
    session::set_password(&tx, account.id, &input.password)?;
    tx.commit()?;

    tracing::info!(account_id = %account.id, facility = %facility, "Patient self-registered");
    Ok(account)
}

/// Create the first administrator. Refused once any administrator exists.
pub fn bootstrap_admin(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
) -> Result<Account, CareError> {
    let name = required("name", name)?;
    let email = validate_email(email)?;
    session::validate_password(password)?;

    let tx = conn.unchecked_transaction()?;
    if db::admin_exists(&tx)? {
        return Err(CareError::Conflict("an administrator already exists".into()));
    }
    let account = insert_admin(&tx, name, email, password)?;
    tx.commit()?;

    tracing::info!(account_id = %account.id, "Bootstrap administrator created");
    Ok(account)
}

/// An administrator provisions the administrator of a new facility. The new
/// account is its own facility and shares nothing with the caller's.
pub fn create_facility_admin(
    conn: &Connection,
    session: &Session,
    input: NewAdministrator,
) -> Result<Account, CareError> {
    let creator = session.require_admin()?;
    let name = required("name", &input.name)?;
    let email = validate_email(&input.email)?;
    session::validate_password(&input.password)?;

    let tx = conn.unchecked_transaction()?;
    let account = insert_admin(&tx, name, email, &input.password)?;
    tx.commit()?;

    tracing::info!(
        account_id = %account.id,
        created_by = %creator,
        "Facility administrator created"
    );
    Ok(account)
}

fn insert_admin(
    conn: &Connection,
    name: String,
    email: String,
    password: &str,
) -> Result<Account, CareError> {
    ensure_email_free(conn, &email)?;
    let account = Account {
        id: Uuid::new_v4(),
        role: Role::Admin,
        name,
        email,
        phone: None,
        address: None,
        profile_image: None,
        facility_id: None,
        wallet_balance: 0,
        nhis_number: None,
        created_at: now_utc(),
        version: 1,
    };
    db::insert_account(conn, &account)?;
    session::set_password(conn, account.id, password)?;
    Ok(account)
}

// ═══════════════════════════════════════════════════════════
// Lookup
// ═══════════════════════════════════════════════════════════

pub fn get_account(conn: &Connection, session: &Session, id: &Uuid) -> Result<Account, CareError> {
    let account = db::require_account(conn, id)?;
    require_account_access(session, &account)?;
    Ok(account)
}

/// Accounts of the caller's facility, optionally narrowed by role.
pub fn list_accounts(
    conn: &Connection,
    session: &Session,
    filter: AccountFilter,
) -> Result<Vec<Account>, CareError> {
    let facility = resolve_facility_scope(session, filter.facility_id)?;
    let accounts = db::list_accounts(
        conn,
        &AccountFilter {
            facility_id: Some(facility),
            role: filter.role,
        },
    )?;
    Ok(accounts)
}

/// Patients of the caller's facility whose NHIS number contains `query`.
pub fn search_patients(
    conn: &Connection,
    session: &Session,
    query: &str,
) -> Result<Vec<Account>, CareError> {
    let facility = resolve_facility_scope(session, None)?;
    let query = query.trim();
    if query.chars().count() < MIN_NHIS_QUERY_LENGTH {
        return Ok(Vec::new());
    }
    Ok(db::search_patients_by_nhis(conn, Some(&facility), query)?)
}

// ═══════════════════════════════════════════════════════════
// Profile edits
// ═══════════════════════════════════════════════════════════

/// The account owner edits their own profile.
pub fn update_profile(
    conn: &Connection,
    session: &Session,
    id: &Uuid,
    update: ProfileUpdate,
) -> Result<Account, CareError> {
    let mut account = db::require_account(conn, id)?;
    if session.account_id != account.id {
        return Err(CareError::PermissionDenied(
            "only the account owner can edit this profile".into(),
        ));
    }

    if let Some(name) = update.name {
        account.name = required("name", &name)?;
    }
    if let Some(phone) = update.phone {
        account.phone = Some(required("phone", &phone)?);
    }
    if let Some(address) = update.address {
        account.address = Some(required("address", &address)?);
    }
    if let Some(image) = update.profile_image {
        account.profile_image = optional(Some(image));
    }

    let expected = update.expected_version.unwrap_or(account.version);
    account.version = db::update_account_profile(conn, &account, expected)?;
    tracing::info!(account_id = %account.id, version = account.version, "Profile updated");
    Ok(account)
}
