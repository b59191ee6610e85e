//! Google OAuth constants
//!
//! Endpoints and the fixed scope set requested on every consent. The client
//! identifier and secret are not here: they come from the environment through
//! [`ClientConfig`](crate::ClientConfig).

/// Authorization endpoint that renders the consent screen
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested in full on every consent. No incremental negotiation.
pub const SCOPES: [&str; 5] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/forms",
];

/// Path served by the local callback listener
pub const CALLBACK_PATH: &str = "/oauth2callback";

/// Directory name under the platform config root
pub const DEFAULT_APP_DIR: &str = "GoogleAPI";

/// File name of the persisted credential record
pub const TOKEN_FILE_NAME: &str = "token.json";

/// Environment variable holding the OAuth client identifier
pub const CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";

/// Environment variable holding the OAuth client secret
pub const CLIENT_SECRET_ENV: &str = "GOOGLE_CLIENT_SECRET";
