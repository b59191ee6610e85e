//! Environment variable lookups
//!
//! Blank values are treated the same as unset ones: a `.env` line like
//! `GOOGLE_CLIENT_ID=` must not count as configured.

use crate::error::{Error, Result};

/// Read a variable that must be present and non-blank.
pub fn require_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| Error::MissingEnv(name.to_owned()))
}

/// Read a variable, returning `None` when unset, blank, or not valid UTF-8.
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
