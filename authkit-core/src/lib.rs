//! Authentication session and secure-credential subsystem for the mobile
//! client.
//!
//! Owns the token lifecycle (login, logout, hydrate, refresh), decodes
//! identity claims from the identity token, persists secrets through
//! platform-appropriate encryption and classifies/redacts PII in queued
//! offline actions before they reach logs or unencrypted storage. The HTTP
//! transport and the platform key-value/secret backends are collaborators
//! injected at the trait seams.
#![warn(clippy::all, clippy::pedantic)]

pub mod claims;
pub mod error;
pub mod pii;
pub mod platform;
pub mod session;
pub mod storage;

pub use claims::{decode_claims, Claims};
pub use error::AuthError;
pub use session::{AuthSession, AuthStatus, SessionManager};
pub use storage::{SecureKvStore, SecureStorage, StorageError};
