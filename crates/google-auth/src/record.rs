//! The persisted credential record and the handle given to callers
//!
//! The JSON layout matches the `token.json` written by the Google client
//! libraries, so a file produced by either side can be read by the other.
//! `expiry_date` is a unix timestamp in milliseconds (absolute, not a delta).

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A complete OAuth token set as stored on disk.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Short-lived bearer token
    #[serde(alias = "token")]
    pub access_token: String,
    /// Long-lived token, absent when offline access was not granted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiration as unix timestamp in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl CredentialRecord {
    /// Record holding only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expiry_date: None,
            scope: None,
            token_type: None,
            id_token: None,
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True when an expiry is known and it is not after `now_ms`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now_ms)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_date", &self.expiry_date)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Ready-to-use credential returned by
/// [`CredentialManager::get_credentials`](crate::CredentialManager::get_credentials).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHandle {
    record: CredentialRecord,
}

impl CredentialHandle {
    pub fn access_token(&self) -> &str {
        &self.record.access_token
    }

    /// Value for the `Authorization` header, e.g. `Bearer ya29...`.
    pub fn authorization_header(&self) -> String {
        let token_type = self.record.token_type.as_deref().unwrap_or("Bearer");
        format!("{token_type} {}", self.record.access_token)
    }

    /// Expiration as unix timestamp in milliseconds, when known.
    pub fn expires_at(&self) -> Option<u64> {
        self.record.expiry_date
    }

    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }

    pub fn into_record(self) -> CredentialRecord {
        self.record
    }
}

impl From<CredentialRecord> for CredentialHandle {
    fn from(record: CredentialRecord) -> Self {
        Self { record }
    }
}

/// Current wall-clock time as unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
