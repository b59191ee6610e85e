//! How the operator learns the consent URL

use tracing::{info, warn};

/// Presents the authorization URL to the operator.
///
/// Called once per consent flow, after the callback listener is ready.
/// Must not block for long: the flow waits for the redirect, not for this.
pub trait Notifier: Send + Sync {
    fn notify(&self, authorization_url: &str);
}

/// Opens the default browser and prints the URL as well.
///
/// A spawned opener does not prove a browser appeared (headless hosts), so
/// the URL is always shown.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNotifier;

impl Notifier for BrowserNotifier {
    fn notify(&self, authorization_url: &str) {
        match open::that_detached(authorization_url) {
            Ok(()) => info!("opened browser for authorization"),
            Err(e) => warn!(error = %e, "could not open a browser"),
        }
        print_url(authorization_url);
    }
}

/// Only prints the URL, for headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, authorization_url: &str) {
        print_url(authorization_url);
    }
}

fn print_url(authorization_url: &str) {
    eprintln!("{}", url_notice(authorization_url));
}

fn url_notice(authorization_url: &str) -> String {
    format!(
        "Visit this URL to authorize access:\n\n  {authorization_url}\n"
    )
}
