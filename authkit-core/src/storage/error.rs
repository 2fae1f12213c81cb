//! Error types for the secure storage components.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the secure storage primitives.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Errors coming from the platform secret store.
    #[error("secret store error: {0}")]
    SecretStore(String),

    /// Errors coming from the key-value backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// Invalid or malformed key material.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Cryptographic failures in the software encryption layer.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Serialization/deserialization failures for persisted records.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store for this domain is disabled on the current platform.
    #[error("store disabled for domain {0}")]
    Disabled(&'static str),
}
