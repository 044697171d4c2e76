//! Shared fixtures for unit tests.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, insert_account, now_utc};
use crate::models::{Account, Role};
use crate::session::Session;

fn insert(conn: &Connection, role: Role, name: &str, email: &str, facility: Option<Uuid>) -> Account {
    let account = Account {
        id: Uuid::new_v4(),
        role,
        name: name.into(),
        email: email.into(),
        phone: Some("08030000000".into()),
        address: Some("12 Awolowo Road, Ikoyi".into()),
        profile_image: None,
        facility_id: facility,
        wallet_balance: 0,
        nhis_number: (role == Role::Patient).then(|| format!("NHIS{}", &Uuid::new_v4().simple().to_string()[..5])),
        created_at: now_utc(),
        version: 1,
    };
    insert_account(conn, &account).unwrap();
    account
}

pub fn seed_admin(conn: &Connection) -> Account {
    insert(conn, Role::Admin, "Ngozi Adeyemi", "admin@naijacare.test", None)
}

/// A second, unrelated facility.
pub fn seed_other_admin(conn: &Connection) -> Account {
    insert(conn, Role::Admin, "Bola Tinubu-Ade", "other-admin@naijacare.test", None)
}

pub fn seed_patient(conn: &Connection, admin: &Account) -> Account {
    let email = format!("patient-{}@naijacare.test", Uuid::new_v4().simple());
    insert(conn, Role::Patient, "Chioma Obi", &email, Some(admin.id))
}

pub fn seed_doctor(conn: &Connection, admin: &Account) -> Account {
    let email = format!("doctor-{}@naijacare.test", Uuid::new_v4().simple());
    insert(conn, Role::Doctor, "Dr. Emeka Eze", &email, Some(admin.id))
}

pub fn session_for(account: &Account) -> Session {
    Session::for_account(account)
}

pub fn reload(conn: &Connection, account: &Account) -> Account {
    db::require_account(conn, &account.id).unwrap()
}
