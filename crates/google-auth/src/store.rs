//! Credential storage for the single OAuth token record
//!
//! One JSON file at a platform-specific location. Writes use temp-file +
//! rename so a reader never sees a half-written record. No cross-process
//! locking: one operator, last writer wins.
//!
//! A file that cannot be read or parsed is reported as "no credentials",
//! which sends the caller through consent again instead of failing.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_APP_DIR, TOKEN_FILE_NAME};
use crate::error::{Error, Result};
use crate::record::{CredentialRecord, now_millis};
use crate::state::{TokenStatus, describe_status};

/// Platform families with distinct token locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    /// `%APPDATA%\<app>\token.json`
    Windows,
    /// `~/.config/<app>/token.json`
    Unix,
}

impl PlatformFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformFamily::Windows
        } else {
            PlatformFamily::Unix
        }
    }
}

/// Compute the token path for a platform family from explicit inputs.
///
/// A missing `APPDATA` or home directory degrades to a relative path rather
/// than failing.
pub fn token_path_for(
    family: PlatformFamily,
    appdata: Option<&Path>,
    home: Option<&Path>,
    app_dir: &str,
) -> PathBuf {
    match family {
        PlatformFamily::Windows => appdata
            .unwrap_or(Path::new(""))
            .join(app_dir)
            .join(TOKEN_FILE_NAME),
        PlatformFamily::Unix => home
            .unwrap_or(Path::new("."))
            .join(".config")
            .join(app_dir)
            .join(TOKEN_FILE_NAME),
    }
}

/// Token path for the running platform. Reads the environment, touches nothing.
pub fn locate(app_dir: &str) -> PathBuf {
    let appdata = std::env::var_os("APPDATA").map(PathBuf::from);
    let home = dirs::home_dir();
    token_path_for(
        PlatformFamily::current(),
        appdata.as_deref(),
        home.as_deref(),
        app_dir,
    )
}

/// File-backed store for the credential record.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_APP_DIR)
    }
}

impl TokenStore {
    /// Store at the platform location for `app_dir`.
    pub fn new(app_dir: &str) -> Self {
        Self {
            path: locate(app_dir),
        }
    }

    /// Store at an explicit file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory tree if it does not exist yet.
    pub async fn ensure_directory(&self) -> Result<()> {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            Error::Storage(format!("creating token directory {}: {e}", dir.display()))
        })
    }

    /// Read the record, distinguishing a missing file from a broken one.
    pub async fn read(&self) -> Result<Option<CredentialRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "reading token file {}: {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))
    }

    /// Load the record. Missing and malformed files yield `None`; a file that
    /// exists but cannot be read is a [`Error::Storage`].
    pub async fn load(&self) -> Result<Option<CredentialRecord>> {
        match self.read().await {
            Ok(Some(record)) => {
                debug!(path = %self.path.display(), "loaded credential record");
                Ok(Some(record))
            }
            Ok(None) => {
                info!(path = %self.path.display(), "no stored credentials");
                Ok(None)
            }
            Err(Error::CredentialParse(e)) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed token file");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Offline report on the stored record. Never touches the network.
    ///
    /// An unreadable file reports as [`TokenStatus::Missing`].
    pub async fn status(&self) -> TokenStatus {
        let record = self.load().await.unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "token file unreadable");
            None
        });
        describe_status(record.as_ref(), now_millis())
    }

    /// Replace the stored record.
    pub async fn save(&self, record: &CredentialRecord) -> Result<()> {
        self.ensure_directory().await?;
        write_atomic(&self.path, record).await
    }
}

/// Write the record to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains OAuth tokens.
async fn write_atomic(path: &Path, record: &CredentialRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Storage("token path has no file name".into()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(format!(".tmp.{}", std::process::id()));
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted credential record");
    Ok(())
}
