//! Interactive consent through a one-shot local callback listener
//!
//! Flow:
//! 1. Bind `127.0.0.1:0`, plus `[::1]` on the same port when available, and
//!    build the authorization URL whose redirect target is
//!    `http://localhost:<port>/oauth2callback`
//! 2. Hand the URL to the [`Notifier`] (browser or console)
//! 3. Serve the callback route until a request carries a `code`
//! 4. Exchange the code, persist the record, answer the browser, resolve
//! 5. Shut the listener down, whatever the outcome
//!
//! Requests to other paths get 404 and requests without a code get 400;
//! neither ends the flow. The listener lives exactly as long as one call to
//! [`ConsentFlow::run`]: it is closed explicitly on completion and by
//! [`CallbackServer`]'s `Drop` if the future is cancelled.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::constants::CALLBACK_PATH;
use crate::error::{Error, Result};
use crate::notifier::Notifier;
use crate::pkce;
use crate::record::{CredentialRecord, now_millis};
use crate::store::TokenStore;
use crate::token::TokenEndpoint;

/// Upper bound on draining in-flight callback responses at shutdown.
const LISTENER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_HTML: &str = "<!DOCTYPE html>
<html><head><meta charset=\"utf-8\"><title>Authorization complete</title></head>
<body style=\"font-family: system-ui; text-align: center; padding-top: 80px;\">
<h2>Authorization complete.</h2>
<p>You can close this window and return to the terminal.</p>
</body></html>";

const FAILURE_HTML: &str = "<!DOCTYPE html>
<html><head><meta charset=\"utf-8\"><title>Authorization failed</title></head>
<body style=\"font-family: system-ui; text-align: center; padding-top: 80px;\">
<h2>Authorization failed.</h2>
<p>The authorization code could not be exchanged. Check the terminal for details.</p>
</body></html>";

const DENIED_HTML: &str = "<!DOCTYPE html>
<html><head><meta charset=\"utf-8\"><title>Authorization denied</title></head>
<body style=\"font-family: system-ui; text-align: center; padding-top: 80px;\">
<h2>Authorization was not granted.</h2>
<p>Open the authorization link again to retry.</p>
</body></html>";

/// Redirect target registered with the provider for a listener on `port`.
pub fn redirect_uri(port: u16) -> String {
    format!("http://localhost:{port}{CALLBACK_PATH}")
}

/// Build the consent URL: offline access, every scope, consent screen forced
/// so the provider issues a refresh token each time.
pub fn build_authorization_url(
    config: &ClientConfig,
    redirect_uri: &str,
    challenge: &str,
) -> Result<String> {
    let mut url = reqwest::Url::parse(&config.auth_url)
        .map_err(|e| Error::Config(format!("invalid authorization URL {}: {e}", config.auth_url)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &config.scopes.join(" "))
        .append_pair("access_type", "offline")
        .append_pair("include_granted_scopes", "true")
        .append_pair("prompt", "consent")
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url.into())
}

/// One interactive authorization, from listener bind to persisted record.
pub struct ConsentFlow {
    config: ClientConfig,
    store: TokenStore,
    endpoint: Arc<dyn TokenEndpoint>,
    notifier: Arc<dyn Notifier>,
}

impl ConsentFlow {
    pub fn new(
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

    /// Run the flow. Waits without a deadline for the operator's redirect.
    pub async fn run(&self) -> Result<CredentialRecord> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| Error::Listener(format!("binding callback listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::Listener(format!("reading callback listener address: {e}")))?
            .port();
        let mut listeners = vec![listener];
        // `localhost` may resolve to ::1 first; serve it on the same port when possible
        match TcpListener::bind((Ipv6Addr::LOCALHOST, port)).await {
            Ok(v6) => listeners.push(v6),
            Err(e) => debug!(port, error = %e, "IPv6 loopback unavailable for callback listener"),
        }

        let redirect_uri = redirect_uri(port);
        let verifier = pkce::generate_verifier();
        let authorization_url = build_authorization_url(
            &self.config,
            &redirect_uri,
            &pkce::compute_challenge(&verifier),
        )?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            endpoint: Arc::clone(&self.endpoint),
            store: self.store.clone(),
            redirect_uri,
            verifier,
            outcome: Mutex::new(Some(outcome_tx)),
        });
        let server = CallbackServer::spawn(listeners, callback_router(state));
        info!(port, "callback listener ready, waiting for authorization");

        self.notifier.notify(&authorization_url);

        let outcome = outcome_rx.await;
        server.close().await;

        match outcome {
            Ok(Ok(record)) => {
                info!("authorization completed");
                Ok(record)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Listener(
                "callback listener stopped before authorization completed".into(),
            )),
        }
    }
}

/// Shared state of the callback handler for one flow.
struct CallbackState {
    endpoint: Arc<dyn TokenEndpoint>,
    store: TokenStore,
    redirect_uri: String,
    verifier: String,
    /// Taken by the first request that carries a code
    outcome: Mutex<Option<oneshot::Sender<Result<CredentialRecord>>>>,
}

impl CallbackState {
    async fn complete(&self, code: &str) -> Result<CredentialRecord> {
        let token = self
            .endpoint
            .exchange_code(code, &self.redirect_uri, &self.verifier)
            .await?;
        let record = token.into_record(now_millis(), None);
        self.store.save(&record).await?;
        Ok(record)
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn callback_router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// GET /oauth2callback: finish the flow on the first request with a code.
async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        warn!(
            error = %error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "provider returned an authorization error"
        );
        return (StatusCode::BAD_REQUEST, Html(DENIED_HTML)).into_response();
    }

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        debug!("callback request without authorization code");
        return (StatusCode::BAD_REQUEST, "Missing code").into_response();
    };

    let Some(outcome_tx) = state.outcome.lock().await.take() else {
        return (StatusCode::CONFLICT, "Authorization already completed").into_response();
    };

    info!("authorization code received, exchanging for tokens");

    // Own task: a browser disconnecting mid-request must not cancel the exchange
    let exchange = tokio::spawn(async move {
        let outcome = state.complete(&code).await;
        if let Err(e) = &outcome {
            warn!(error = %e, "authorization code exchange failed");
        }
        let succeeded = outcome.is_ok();
        let _ = outcome_tx.send(outcome);
        succeeded
    });

    match exchange.await {
        Ok(true) => (StatusCode::OK, Html(SUCCESS_HTML)).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Html(FAILURE_HTML)).into_response(),
    }
}

/// Running callback listeners, one per loopback address family. Dropping it
/// aborts every server task.
struct CallbackServer {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
}

impl CallbackServer {
    fn spawn(listeners: Vec<TcpListener>, router: Router) -> Self {
        let (shutdown, _) = watch::channel(false);
        let tasks = listeners
            .into_iter()
            .map(|listener| {
                let mut shutdown_rx = shutdown.subscribe();
                let router = router.clone();
                tokio::spawn(async move {
                    axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_rx.changed().await;
                        })
                        .await
                })
            })
            .collect();
        Self { shutdown, tasks }
    }

    /// Stop accepting, let the in-flight response reach the browser, then exit.
    async fn close(mut self) {
        let _ = self.shutdown.send(true);
        let deadline = tokio::time::Instant::now() + LISTENER_DRAIN_TIMEOUT;
        for task in std::mem::take(&mut self.tasks) {
            let abort = task.abort_handle();
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(Ok(()))) => debug!("callback listener closed"),
                Ok(Ok(Err(e))) => warn!(error = %e, "callback listener failed"),
                Ok(Err(e)) => warn!(error = %e, "callback listener task panicked"),
                Err(_) => {
                    warn!(
                        drain_timeout_secs = LISTENER_DRAIN_TIMEOUT.as_secs(),
                        "callback listener did not drain in time, aborting"
                    );
                    abort.abort();
                }
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CapturingNotifier, FakeEndpoint, callback_base};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn test_config() -> ClientConfig {
        ClientConfig::new("client-123.apps.googleusercontent.com", "GOCSPX-test")
    }

    type OutcomeRx = oneshot::Receiver<Result<CredentialRecord>>;

    fn test_state(
        endpoint: Arc<FakeEndpoint>,
        store: TokenStore,
    ) -> (Arc<CallbackState>, OutcomeRx) {
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            endpoint,
            store,
            redirect_uri: redirect_uri(8085),
            verifier: "test-verifier".into(),
            outcome: Mutex::new(Some(tx)),
        });
        (state, rx)
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn redirect_uri_targets_callback_path_on_localhost() {
        assert_eq!(redirect_uri(53682), "http://localhost:53682/oauth2callback");
    }

    #[test]
    fn authorization_url_requests_offline_consent_for_all_scopes() {
        let config = test_config();
        let url = build_authorization_url(&config, &redirect_uri(4000), "challenge-xyz").unwrap();
        let parsed = reqwest::Url::parse(&url).unwrap();
        let param = |name: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };

        assert!(url.starts_with(crate::constants::AUTHORIZE_ENDPOINT));
        assert_eq!(param("client_id").as_deref(), Some(config.client_id.as_str()));
        assert_eq!(
            param("redirect_uri").as_deref(),
            Some("http://localhost:4000/oauth2callback")
        );
        assert_eq!(param("response_type").as_deref(), Some("code"));
        assert_eq!(param("access_type").as_deref(), Some("offline"));
        assert_eq!(param("prompt").as_deref(), Some("consent"));
        assert_eq!(param("include_granted_scopes").as_deref(), Some("true"));
        assert_eq!(param("code_challenge").as_deref(), Some("challenge-xyz"));
        assert_eq!(param("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(param("scope"), Some(config.scopes.join(" ")));
        assert!(
            !url.contains("GOCSPX-test"),
            "client secret must never appear in the consent URL"
        );
    }

    #[test]
    fn invalid_auth_url_is_config_error() {
        let mut config = test_config();
        config.auth_url = "not a url".into();
        let result = build_authorization_url(&config, &redirect_uri(1), "c");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn unknown_path_is_404_and_flow_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Arc::new(FakeEndpoint::granting("A", Some("R")));
        let (state, mut rx) =
            test_state(endpoint.clone(), TokenStore::with_path(dir.path().join("t.json")));
        let router = callback_router(state);

        let (status, _) = get(&router, "/wrong-path").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(rx.try_recv().is_err(), "flow must not resolve on a 404");
        assert_eq!(endpoint.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_code_is_400_and_flow_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Arc::new(FakeEndpoint::granting("A", Some("R")));
        let (state, mut rx) =
            test_state(endpoint.clone(), TokenStore::with_path(dir.path().join("t.json")));
        let router = callback_router(state);

        let (status, body) = get(&router, "/oauth2callback").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing code");

        let (status, _) = get(&router, "/oauth2callback?code=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(rx.try_recv().is_err());
        assert_eq!(endpoint.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_error_is_400_and_flow_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Arc::new(FakeEndpoint::granting("A", Some("R")));
        let (state, mut rx) =
            test_state(endpoint.clone(), TokenStore::with_path(dir.path().join("t.json")));
        let router = callback_router(state);

        let (status, body) = get(&router, "/oauth2callback?error=access_denied").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("not granted"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn code_is_exchanged_persisted_and_resolves_flow() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("token.json"));
        let endpoint = Arc::new(FakeEndpoint::granting("A", Some("R")));
        let (state, rx) = test_state(endpoint.clone(), store.clone());
        let router = callback_router(state);

        let (status, body) = get(&router, "/oauth2callback?code=abc&scope=x").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Authorization complete"));

        let record = rx.await.unwrap().unwrap();
        assert_eq!(record.access_token, "A");
        assert_eq!(record.refresh_token.as_deref(), Some("R"));
        assert_eq!(store.load().await.unwrap(), Some(record));
        assert_eq!(endpoint.codes.lock().unwrap().as_slice(), ["abc"]);
    }

    #[tokio::test]
    async fn second_code_after_completion_is_409() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Arc::new(FakeEndpoint::granting("A", Some("R")));
        let (state, _rx) =
            test_state(endpoint.clone(), TokenStore::with_path(dir.path().join("t.json")));
        let router = callback_router(state);

        assert_eq!(get(&router, "/oauth2callback?code=abc").await.0, StatusCode::OK);
        assert_eq!(
            get(&router, "/oauth2callback?code=def").await.0,
            StatusCode::CONFLICT
        );
        assert_eq!(endpoint.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exchange_failure_is_500_and_rejects_flow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let endpoint = Arc::new(FakeEndpoint::failing());
        let (state, rx) = test_state(endpoint, TokenStore::with_path(&path));
        let router = callback_router(state);

        let (status, body) = get(&router, "/oauth2callback?code=abc").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Authorization failed"));

        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, Err(Error::TokenExchange(_))));
        assert!(!path.exists(), "nothing may be persisted on a failed exchange");
    }

    #[tokio::test]
    async fn listener_survives_bad_requests_then_completes_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("token.json"));
        let endpoint = Arc::new(FakeEndpoint::granting("A", Some("R")));
        let (notifier, mut urls) = CapturingNotifier::new();
        let flow = ConsentFlow::new(test_config(), store.clone(), endpoint, Arc::new(notifier));

        let running = tokio::spawn(async move { flow.run().await });
        let authorization_url = urls.recv().await.unwrap();
        let base = callback_base(&authorization_url);
        let client = reqwest::Client::new();

        let wrong = client.get(format!("{base}/wrong-path")).send().await.unwrap();
        assert_eq!(wrong.status(), reqwest::StatusCode::NOT_FOUND);

        let no_code = client.get(format!("{base}/oauth2callback")).send().await.unwrap();
        assert_eq!(no_code.status(), reqwest::StatusCode::BAD_REQUEST);

        let done = client
            .get(format!("{base}/oauth2callback?code=abc"))
            .send()
            .await
            .unwrap();
        assert_eq!(done.status(), reqwest::StatusCode::OK);
        drop(client);

        let record = running.await.unwrap().unwrap();
        assert_eq!(record.access_token, "A");
        assert_eq!(store.load().await.unwrap(), Some(record));

        let after = reqwest::Client::new()
            .get(format!("{base}/oauth2callback?code=late"))
            .send()
            .await;
        assert!(after.is_err(), "listener must be closed once the flow resolves");
    }

    #[tokio::test]
    async fn listener_closes_when_exchange_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("token.json"));
        let (notifier, mut urls) = CapturingNotifier::new();
        let flow = ConsentFlow::new(
            test_config(),
            store,
            Arc::new(FakeEndpoint::failing()),
            Arc::new(notifier),
        );

        let running = tokio::spawn(async move { flow.run().await });
        let base = callback_base(&urls.recv().await.unwrap());

        let response = reqwest::Client::new()
            .get(format!("{base}/oauth2callback?code=abc"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

        let outcome = running.await.unwrap();
        assert!(matches!(outcome, Err(Error::TokenExchange(_))));

        let after = reqwest::Client::new()
            .get(format!("{base}/oauth2callback"))
            .send()
            .await;
        assert!(after.is_err(), "listener must be closed after a failed exchange");
    }

    #[tokio::test]
    async fn dropping_the_flow_closes_the_listener() {
        let dir = tempfile::tempdir().unwrap();
        let (notifier, mut urls) = CapturingNotifier::new();
        let flow = ConsentFlow::new(
            test_config(),
            TokenStore::with_path(dir.path().join("token.json")),
            Arc::new(FakeEndpoint::granting("A", None)),
            Arc::new(notifier),
        );

        let running = tokio::spawn(async move { flow.run().await });
        let base = callback_base(&urls.recv().await.unwrap());
        running.abort();
        let _ = running.await;
        tokio::task::yield_now().await;

        let after = reqwest::Client::new()
            .get(format!("{base}/oauth2callback"))
            .send()
            .await;
        assert!(after.is_err(), "cancelled flow must not leave the listener open");
    }

    #[tokio::test]
    async fn callback_is_served_on_ipv6_loopback_too() {
        if std::net::TcpListener::bind("[::1]:0").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let (notifier, mut urls) = CapturingNotifier::new();
        let flow = ConsentFlow::new(
            test_config(),
            TokenStore::with_path(dir.path().join("token.json")),
            Arc::new(FakeEndpoint::granting("A6", None)),
            Arc::new(notifier),
        );

        let running = tokio::spawn(async move { flow.run().await });
        let v4_base = callback_base(&urls.recv().await.unwrap());
        let port = v4_base.rsplit(':').next().unwrap().to_owned();
        let v6_base = format!("http://[::1]:{port}");

        let response = reqwest::Client::new()
            .get(format!("{v6_base}/oauth2callback?code=abc"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let record = running.await.unwrap().unwrap();
        assert_eq!(record.access_token, "A6");

        for base in [v4_base, v6_base] {
            let after = reqwest::Client::new()
                .get(format!("{base}/oauth2callback"))
                .send()
                .await;
            assert!(after.is_err(), "{base} must be closed once the flow resolves");
        }
    }
}
