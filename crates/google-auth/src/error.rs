//! Error types for credential operations

/// Errors from credential operations.
///
/// `CredentialParse` never reaches callers of
/// [`TokenStore::load`](crate::TokenStore::load): a corrupt record is treated
/// as no record at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("callback listener error: {0}")]
    Listener(String),
}

impl From<common::Error> for Error {
    fn from(err: common::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
