//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client id and secret never live in the TOML: they come from the
//! environment, optionally seeded from the dotenv file named in `[auth]`.

use std::path::{Path, PathBuf};

use google_auth::{DEFAULT_APP_DIR, TokenStore};
use serde::Deserialize;

/// Config file used when neither `--config` nor `SHEET_READER_CONFIG` is given
pub const DEFAULT_CONFIG_PATH: &str = "sheet-reader.toml";

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "SHEET_READER_CONFIG";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Which cells to read
#[derive(Debug, Deserialize)]
pub struct SheetConfig {
    #[serde(default = "default_spreadsheet_id")]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// A1 notation, without the sheet name
    #[serde(default = "default_range")]
    pub range: String,
}

/// Where credentials and client secrets come from
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Directory under the platform config root holding `token.json`
    #[serde(default = "default_app_dir")]
    pub app_dir: String,
    /// Explicit token file, overrides `app_dir`
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// Dotenv file with `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

fn default_spreadsheet_id() -> String {
    "1YWiFGyJjNDbOC8eFTbS1HEhmxfZAC-hLvI8KdA1Gku8".into()
}

fn default_sheet_name() -> String {
    "테스트".into()
}

fn default_range() -> String {
    "A1:Z5".into()
}

fn default_app_dir() -> String {
    DEFAULT_APP_DIR.into()
}

fn default_env_file() -> PathBuf {
    PathBuf::from("config/.env")
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: default_spreadsheet_id(),
            sheet_name: default_sheet_name(),
            range: default_range(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_dir: default_app_dir(),
            token_path: None,
            env_file: default_env_file(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file at the default location
    /// yields the built-in defaults. An explicitly named file must exist.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Resolve config file path from CLI arg or `SHEET_READER_CONFIG`.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Some(p) = common::optional_env(CONFIG_PATH_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    fn validate(&self) -> common::Result<()> {
        if self.sheet.spreadsheet_id.trim().is_empty() {
            return Err(common::Error::Config("sheet.spreadsheet_id must not be empty".into()));
        }
        if self.sheet.sheet_name.trim().is_empty() {
            return Err(common::Error::Config("sheet.sheet_name must not be empty".into()));
        }
        if self.sheet.range.trim().is_empty() {
            return Err(common::Error::Config("sheet.range must not be empty".into()));
        }
        Ok(())
    }

    /// Token store selected by `[auth]`.
    pub fn token_store(&self) -> TokenStore {
        match &self.auth.token_path {
            Some(path) => TokenStore::with_path(path),
            None => TokenStore::new(&self.auth.app_dir),
        }
    }
}

/// Seed the process environment from a dotenv file.
///
/// Variables already set in the environment are left alone. Returns `false`
/// when the file does not exist.
pub fn load_env_file(path: &Path) -> common::Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(common::Error::Config(format!(
            "failed to load env file {}: {e}",
            path.display()
        ))),
    }
}
