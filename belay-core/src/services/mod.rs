//! Service layer for business logic
//!
//! Services orchestrate the repositories, the lockout policy and the token
//! issuer. They are `Send + Sync` and meant to be shared behind an `Arc`.

pub mod account;
pub mod audit;
pub mod auth;

#[cfg(test)]
pub(crate) mod testing;

pub use account::{AccountService, Registration};
pub use audit::AuditLogger;
pub use auth::{AuthService, LoginRequest, LoginResponse, RefreshResponse};
