//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter
//! 2. Auth validator — bearer token → session
//! 3. Audit logger (sees the authenticated account)

pub mod audit;
pub mod auth;
pub mod rate;
