//! Account access authorization.
//!
//! Default-deny, checked in order:
//! 1. Own account → allowed
//! 2. Administrator of the account's facility → allowed
//! 3. Otherwise → denied
//!
//! Facility-scoped operations additionally require an administrator session
//! whose facility matches the requested one.

use uuid::Uuid;

use crate::error::CareError;
use crate::models::Account;
use crate::session::Session;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Why access was granted (or denied), for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    OwnAccount,
    FacilityAdmin,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self { allowed: true, reason }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

pub fn check_account_access(session: &Session, target: &Account) -> AccessDecision {
    if session.account_id == target.id {
        return AccessDecision::allow(AccessReason::OwnAccount);
    }
    if session.is_admin() && target.facility_id == Some(session.account_id) {
        return AccessDecision::allow(AccessReason::FacilityAdmin);
    }
    AccessDecision::deny()
}

/// `check_account_access` as a `Result`, logging denials.
pub fn require_account_access(
    session: &Session,
    target: &Account,
) -> Result<AccessReason, CareError> {
    let decision = check_account_access(session, target);
    if decision.allowed {
        return Ok(decision.reason);
    }
    tracing::warn!(
        caller = %session.account_id,
        target = %target.id,
        "Account access denied"
    );
    Err(CareError::PermissionDenied(
        "account belongs to another facility".into(),
    ))
}

/// The caller must administer the facility that owns `target`.
pub fn require_facility_admin(session: &Session, target: &Account) -> Result<Uuid, CareError> {
    let facility = session.require_admin()?;
    if target.facility_id != Some(facility) {
        tracing::warn!(
            caller = %session.account_id,
            target = %target.id,
            "Facility administration denied"
        );
        return Err(CareError::PermissionDenied(
            "account belongs to another facility".into(),
        ));
    }
    Ok(facility)
}

/// Resolve the facility an administrative listing runs against. Omitting
/// `requested` means the caller's own facility; naming another one is
/// denied.
pub fn resolve_facility_scope(
    session: &Session,
    requested: Option<Uuid>,
) -> Result<Uuid, CareError> {
    let facility = session.require_admin()?;
    match requested {
        Some(id) if id != facility => Err(CareError::PermissionDenied(
            "cannot read another facility".into(),
        )),
        _ => Ok(facility),
    }
}
