//! User registration and login.
//!
//! Users are plain records in the directory; the messaging core only ever
//! resolves them by id.

pub mod handlers;
mod service;

pub use service::{hash_password, verify_password, AuthService, NewUser};
