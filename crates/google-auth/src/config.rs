//! OAuth client configuration
//!
//! Built once by the caller and handed to the
//! [`CredentialManager`](crate::CredentialManager). Nothing in this crate reads
//! the client identifier or secret from global state.

use common::Secret;

use crate::constants::{
    AUTHORIZE_ENDPOINT, CLIENT_ID_ENV, CLIENT_SECRET_ENV, SCOPES, TOKEN_ENDPOINT,
};
use crate::error::{Error, Result};

/// Installed-app OAuth client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Consent screen endpoint
    pub auth_url: String,
    /// Code exchange and refresh endpoint
    pub token_url: String,
    /// Requested in full on every consent
    pub scopes: Vec<String>,
}

impl ClientConfig {
    /// Client with Google's endpoints and the fixed scope set.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret.into()),
            auth_url: AUTHORIZE_ENDPOINT.to_owned(),
            token_url: TOKEN_ENDPOINT.to_owned(),
            scopes: SCOPES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Read `GOOGLE_CLIENT_ID` and `GOOGLE_CLIENT_SECRET` from the environment.
    pub fn from_env() -> Result<Self> {
        let client_id = common::require_env(CLIENT_ID_ENV)?;
        let client_secret = common::require_env(CLIENT_SECRET_ENV)?;
        Ok(Self::new(client_id, client_secret))
    }

    /// Reject configurations that cannot possibly authenticate.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.is_blank() {
            return Err(Error::Config(format!(
                "{CLIENT_ID_ENV} and {CLIENT_SECRET_ENV} are required"
            )));
        }
        if self.scopes.is_empty() {
            return Err(Error::Config("at least one scope must be requested".into()));
        }
        Ok(())
    }
}
