//! OAuth token endpoint: code exchange and token refresh
//!
//! The protocol itself belongs to the provider. This module only defines the
//! capability the rest of the crate calls ([`TokenEndpoint`]) and a `reqwest`
//! implementation that POSTs form bodies to Google's token endpoint.

use std::future::Future;
use std::pin::Pin;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::record::CredentialRecord;

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Converted to an
/// absolute millisecond timestamp by [`TokenResponse::into_record`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Build the record to persist.
    ///
    /// Refresh responses usually omit `refresh_token`; `previous_refresh`
    /// carries the one that was just used so it is not lost.
    pub fn into_record(self, now_ms: u64, previous_refresh: Option<&str>) -> CredentialRecord {
        CredentialRecord {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .filter(|t| !t.is_empty())
                .or_else(|| previous_refresh.map(str::to_owned)),
            expiry_date: self
                .expires_in
                .map(|secs| now_ms.saturating_add(secs.saturating_mul(1000))),
            scope: self.scope,
            token_type: self.token_type,
            id_token: self.id_token,
        }
    }
}

/// Boxed future returned by [`TokenEndpoint`] methods.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>>;

/// The external OAuth capability: turns codes and refresh tokens into tokens.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenEndpoint>`).
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code received on `redirect_uri`.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        redirect_uri: &'a str,
        verifier: &'a str,
    ) -> TokenFuture<'a>;

    /// Mint a new access token from a refresh token.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a>;
}

/// Google token endpoint client.
pub struct GoogleTokenClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Secret<String>,
}

impl GoogleTokenClient {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    async fn post_form(&self, form: &[(&str, &str)], grant: &'static str) -> Result<TokenResponse> {
        debug!(grant, url = %self.token_url, "calling token endpoint");
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{grant} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(classify_failure(status.as_u16(), &body, grant));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid {grant} response: {e}")))
    }
}

impl TokenEndpoint for GoogleTokenClient {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        redirect_uri: &'a str,
        verifier: &'a str,
    ) -> TokenFuture<'a> {
        Box::pin(async move {
            self.post_form(
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("code_verifier", verifier),
                    ("redirect_uri", redirect_uri),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose().as_str()),
                ],
                "authorization_code",
            )
            .await
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            self.post_form(
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose().as_str()),
                ],
                "refresh_token",
            )
            .await
        })
    }
}

/// Map a non-success token endpoint response to an error.
///
/// Google answers a revoked or expired grant with `400 invalid_grant`; a bad
/// client gives `401 invalid_client`. Both mean the stored credentials cannot
/// be used again.
fn classify_failure(status: u16, body: &str, grant: &str) -> Error {
    let rejected = status == 401 || (status == 400 && body.contains("invalid_grant"));
    if rejected {
        Error::InvalidCredentials(format!("{grant} rejected ({status}): {body}"))
    } else {
        Error::TokenExchange(format!("{grant} returned {status}: {body}"))
    }
}
