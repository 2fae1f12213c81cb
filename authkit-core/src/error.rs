//! Error outputs from the session subsystem.

use thiserror::Error;

use crate::session::api::ExchangeError;
use crate::storage::StorageError;

/// Errors raised by the session state machine and the identity token codec.
///
/// The `Display` strings for the token-shape variants are surfaced verbatim in
/// the session's `error` field, so they are user-facing.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential exchange succeeded but carried no identity token.
    #[error("No ID token received")]
    MissingIdToken,

    /// The identity token is not a well-formed dot-delimited token.
    #[error("Invalid ID token format")]
    MalformedToken,

    /// The decoded claims segment could not be parsed.
    #[error("invalid claims payload: {0}")]
    InvalidClaims(String),

    /// Unexpected error serializing a persisted record.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The durable token bundle could not be written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transient credential-exchange failure, re-raised so the caller can
    /// retry later.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}
