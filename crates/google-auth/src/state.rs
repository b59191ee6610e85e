//! Decide what a stored record is good for
//!
//! Pure functions over the loaded record and the current time. A present
//! refresh token always means "refresh", even before the access token expires.

use std::fmt;

use crate::record::CredentialRecord;

/// What the orchestrator must do with the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Return the stored record as-is, no network
    Usable,
    /// Exchange the stored refresh token for a new access token
    NeedsRefresh,
    /// Run the interactive consent flow
    NeedsConsent,
}

/// Evaluate a loaded record (or its absence) at `now_ms`.
pub fn evaluate(record: Option<&CredentialRecord>, now_ms: u64) -> CredentialState {
    match record {
        None => CredentialState::NeedsConsent,
        Some(record) if record.has_refresh_token() => CredentialState::NeedsRefresh,
        Some(record) if record.is_expired_at(now_ms) => CredentialState::NeedsConsent,
        Some(_) => CredentialState::Usable,
    }
}

/// Offline report on the stored token, for display before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token file, or it could not be parsed
    Missing,
    /// Access token not expired (or no expiry recorded)
    Valid,
    /// Access token expired but a refresh token is available
    Refreshable,
    /// Access token expired and nothing to refresh with
    Expired,
}

impl TokenStatus {
    pub fn needs_auth(self) -> bool {
        matches!(self, TokenStatus::Missing | TokenStatus::Expired)
    }

    pub fn message(self) -> &'static str {
        match self {
            TokenStatus::Missing => "no stored token, authorization required",
            TokenStatus::Valid => "stored token is valid",
            TokenStatus::Refreshable => "stored token expired but can be refreshed",
            TokenStatus::Expired => "stored token expired, authorization required",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Describe the stored record without deciding an action.
pub fn describe_status(record: Option<&CredentialRecord>, now_ms: u64) -> TokenStatus {
    match record {
        None => TokenStatus::Missing,
        Some(record) if !record.is_expired_at(now_ms) => TokenStatus::Valid,
        Some(record) if record.has_refresh_token() => TokenStatus::Refreshable,
        Some(_) => TokenStatus::Expired,
    }
}
