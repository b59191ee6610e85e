//! Google OAuth credential management for a single local operator
//!
//! Obtains, persists, and refreshes one OAuth2 token set, running an
//! interactive browser consent with a one-shot local callback listener when
//! nothing stored can be used. This crate has no dependency on any consumer
//! binary and can be tested on its own.
//!
//! Credential flow:
//! 1. Caller builds a [`ClientConfig`] (usually [`ClientConfig::from_env`])
//! 2. [`CredentialManager::get_credentials`] loads the record via [`TokenStore`]
//! 3. [`state::evaluate`] decides: use as-is, refresh, or ask for consent
//! 4. Refresh goes through the [`TokenEndpoint`]; failure falls back to consent
//! 5. [`consent::ConsentFlow`] opens the browser and waits on the callback
//! 6. The resulting record is saved and returned as a [`CredentialHandle`]

pub mod config;
pub mod consent;
pub mod constants;
pub mod error;
pub mod manager;
pub mod notifier;
pub mod pkce;
pub mod record;
pub mod state;
pub mod store;
pub mod token;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use manager::CredentialManager;
pub use notifier::{BrowserNotifier, LogNotifier, Notifier};
pub use record::{CredentialHandle, CredentialRecord};
pub use state::{CredentialState, TokenStatus};
pub use store::TokenStore;
pub use token::{GoogleTokenClient, TokenEndpoint, TokenResponse};
