//! API endpoint handlers.
//!
//! Each module corresponds to one area of the care service. Handlers run
//! store work on the blocking pool through `ApiContext::with_db`.

pub mod accounts;
pub mod appointments;
pub mod auth;
pub mod health;
pub mod reports;
pub mod wallet;
