//! The authentication session: state machine, exchange contract and state
//! types.

pub mod api;
pub mod manager;
pub mod types;

pub use api::{CredentialExchange, ExchangeError, LoginOutcome};
pub use manager::SessionManager;
pub use types::{
    AuthSession, AuthStatus, LoginCredentials, StoredAuthResponse, TokenGrant,
    ACCESS_TOKEN_REFRESH_BUFFER_MS, DEFAULT_ACCESS_TOKEN_TTL_MS, REFRESH_TOKEN_TTL_MS,
};
