//! Test doubles for the token endpoint and the notifier.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::error::Error;
use crate::notifier::Notifier;
use crate::token::{TokenEndpoint, TokenFuture, TokenResponse};

/// Scripted token endpoint. `None` outcomes fail the call.
#[derive(Default)]
pub(crate) struct FakeEndpoint {
    exchange_tokens: Option<(&'static str, Option<&'static str>)>,
    refresh_access: Option<&'static str>,
    pub(crate) exchanges: AtomicUsize,
    pub(crate) refreshes: AtomicUsize,
    pub(crate) codes: Mutex<Vec<String>>,
    pub(crate) refreshed_with: Mutex<Vec<String>>,
}

impl FakeEndpoint {
    /// Code exchange yields `access` / `refresh`; refresh fails as revoked.
    pub(crate) fn granting(access: &'static str, refresh: Option<&'static str>) -> Self {
        Self {
            exchange_tokens: Some((access, refresh)),
            ..Default::default()
        }
    }

    /// Every call fails.
    pub(crate) fn failing() -> Self {
        Self::default()
    }

    /// Refresh yields `access` and no new refresh token.
    pub(crate) fn refreshing_to(mut self, access: &'static str) -> Self {
        self.refresh_access = Some(access);
        self
    }

    pub(crate) fn network_calls(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst) + self.refreshes.load(Ordering::SeqCst)
    }
}

impl TokenEndpoint for FakeEndpoint {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        _redirect_uri: &'a str,
        _verifier: &'a str,
    ) -> TokenFuture<'a> {
        Box::pin(async move {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            self.codes.lock().unwrap().push(code.to_owned());
            match self.exchange_tokens {
                Some((access, refresh)) => Ok(TokenResponse {
                    access_token: access.to_owned(),
                    refresh_token: refresh.map(str::to_owned),
                    expires_in: Some(3600),
                    token_type: Some("Bearer".into()),
                    ..Default::default()
                }),
                None => Err(Error::TokenExchange(
                    "authorization_code returned 400: invalid_request".into(),
                )),
            }
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            self.refreshed_with
                .lock()
                .unwrap()
                .push(refresh_token.to_owned());
            match self.refresh_access {
                Some(access) => Ok(TokenResponse {
                    access_token: access.to_owned(),
                    expires_in: Some(3600),
                    token_type: Some("Bearer".into()),
                    ..Default::default()
                }),
                None => Err(Error::InvalidCredentials(
                    "refresh_token rejected (400): invalid_grant".into(),
                )),
            }
        })
    }
}

/// Hands every authorization URL to the test through a channel.
pub(crate) struct CapturingNotifier {
    urls: mpsc::UnboundedSender<String>,
}

impl CapturingNotifier {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (urls, rx) = mpsc::unbounded_channel();
        (Self { urls }, rx)
    }
}

impl Notifier for CapturingNotifier {
    fn notify(&self, authorization_url: &str) {
        let _ = self.urls.send(authorization_url.to_owned());
    }
}

/// Plays the browser: follows the consent URL straight to the callback with `code`.
pub(crate) struct SimulatedBrowser {
    code: &'static str,
    pub(crate) visits: AtomicUsize,
}

impl SimulatedBrowser {
    pub(crate) fn approving(code: &'static str) -> Self {
        Self {
            code,
            visits: AtomicUsize::new(0),
        }
    }
}

impl Notifier for SimulatedBrowser {
    fn notify(&self, authorization_url: &str) {
        self.visits.fetch_add(1, Ordering::SeqCst);
        let callback = format!(
            "{}/oauth2callback?code={}",
            callback_base(authorization_url),
            self.code
        );
        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
    }
}

/// `http://127.0.0.1:<port>` of the listener named in an authorization URL.
pub(crate) fn callback_base(authorization_url: &str) -> String {
    let url = reqwest::Url::parse(authorization_url).unwrap();
    let redirect = url
        .query_pairs()
        .find(|(key, _)| key == "redirect_uri")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    let port = reqwest::Url::parse(&redirect).unwrap().port().unwrap();
    format!("http://127.0.0.1:{port}")
}
