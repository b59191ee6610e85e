//! Credential orchestration
//!
//! [`CredentialManager::get_credentials`] is the single entry point callers
//! use: it loads the stored record, decides what it is good for, and refreshes
//! or runs the consent flow as needed. Callers never see which path was taken.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::consent::ConsentFlow;
use crate::error::Result;
use crate::notifier::{BrowserNotifier, Notifier};
use crate::record::{CredentialHandle, CredentialRecord, now_millis};
use crate::state::{CredentialState, TokenStatus, evaluate};
use crate::store::TokenStore;
use crate::token::{GoogleTokenClient, TokenEndpoint};

/// Produces usable credentials, asking the operator only when nothing stored
/// can be used or refreshed.
pub struct CredentialManager {
    config: ClientConfig,
    store: TokenStore,
    endpoint: Arc<dyn TokenEndpoint>,
    notifier: Arc<dyn Notifier>,
}

impl CredentialManager {
    /// Manager talking to Google's token endpoint and opening the system browser.
    pub fn new(config: ClientConfig, store: TokenStore) -> Self {
        let endpoint = Arc::new(GoogleTokenClient::new(reqwest::Client::new(), &config));
        Self::with_parts(config, store, endpoint, Arc::new(BrowserNotifier))
    }

    pub fn with_parts(
        config: ClientConfig,
        store: TokenStore,
        endpoint: Arc<dyn TokenEndpoint>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            endpoint,
            notifier,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Offline report on the stored token. Reads the store only.
    pub async fn status(&self) -> TokenStatus {
        self.store.status().await
    }

    /// Return credentials ready for API calls.
    ///
    /// May block on the operator completing consent in a browser. Fails with
    /// [`Error::Config`](crate::Error::Config) before touching disk or network
    /// when the client identifier or secret is blank.
    pub async fn get_credentials(&self) -> Result<CredentialHandle> {
        self.config.validate()?;
        self.store.ensure_directory().await?;

        let stored = self.store.load().await?;
        match (evaluate(stored.as_ref(), now_millis()), stored) {
            (CredentialState::Usable, Some(record)) => {
                debug!(path = %self.store.path().display(), "using stored access token");
                Ok(record.into())
            }
            (CredentialState::NeedsRefresh, Some(record)) => self.refresh_or_consent(record).await,
            _ => {
                info!("no usable stored credentials, starting authorization");
                self.consent().await
            }
        }
    }

    async fn refresh_or_consent(&self, stored: CredentialRecord) -> Result<CredentialHandle> {
        let Some(refresh_token) = stored.refresh_token.as_deref() else {
            return self.consent().await;
        };

        match self.refresh(refresh_token).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                warn!(error = %e, "token refresh failed, falling back to authorization");
                self.consent().await
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialHandle> {
        let token = self.endpoint.refresh(refresh_token).await?;
        let record = token.into_record(now_millis(), Some(refresh_token));
        self.store.save(&record).await?;
        info!("access token refreshed");
        Ok(record.into())
    }

    async fn consent(&self) -> Result<CredentialHandle> {
        let flow = ConsentFlow::new(
            self.config.clone(),
            self.store.clone(),
            Arc::clone(&self.endpoint),
            Arc::clone(&self.notifier),
        );
        flow.run().await.map(CredentialHandle::from)
    }
}
