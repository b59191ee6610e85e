//! Service-specific error types

use thiserror::Error;

/// Failures reading from the Sheets API.
///
/// Credential failures stay as [`google_auth::Error`]; these only cover the
/// call made with an already valid handle.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid Sheets request: {0}")]
    InvalidRequest(String),

    #[error("Sheets request failed: {0}")]
    Http(String),

    #[error("Sheets API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected Sheets response: {0}")]
    Decode(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
