//! Application settings.
//!
//! Settings are loaded once at startup, either from a TOML file or from the
//! process environment (after `.env` has been loaded), validated, and then
//! passed by value to whatever needs them. Business logic never reads the
//! environment itself.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `SeaORM` connection string
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Directory that relative asset paths are resolved against
    #[serde(default = "default_assets_root")]
    pub assets_root: PathBuf,
    /// Sub-directory (relative to `assets_root`) that receives new uploads
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Administrator credentials consumed by the authentication layer
    pub admin: AdminCredentials,
    /// Sender identity for moderation notifications
    #[serde(default)]
    pub mail: MailSettings,
}

/// Credentials for the single administrator account.
#[derive(Clone, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
    /// Secret used to sign administrator session tokens
    pub token_secret: String,
}

// Keep secrets out of logs.
impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// Sender identity used when rendering outbound messages
#[derive(Debug, Clone, Deserialize)]
pub struct MailSettings {
    pub sender_address: String,
    pub sender_name: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender_address: "no-reply@localhost".to_string(),
            sender_name: "Listings Team".to_string(),
        }
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_assets_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

impl AppConfig {
    /// Builds the configuration from environment variables.
    ///
    /// `ADMIN_USER`, `ADMIN_PASSWORD` and `ADMIN_JWT_SECRET` are required;
    /// everything else falls back to a default.
    pub fn from_env() -> Result<Self> {
        let required = |key: &str| {
            std::env::var(key).map_err(|e| Error::Config {
                message: format!("{key} is not set: {e}"),
            })
        };
        let optional = |key: &str| std::env::var(key).ok();

        let defaults = MailSettings::default();
        let config = Self {
            database_url: optional("DATABASE_URL").unwrap_or_else(default_database_url),
            assets_root: optional("ASSETS_ROOT").map_or_else(default_assets_root, PathBuf::from),
            upload_dir: optional("UPLOAD_DIR").unwrap_or_else(default_upload_dir),
            admin: AdminCredentials {
                username: required("ADMIN_USER")?,
                password: required("ADMIN_PASSWORD")?,
                token_secret: required("ADMIN_JWT_SECRET")?,
            },
            mail: MailSettings {
                sender_address: optional("MAIL_USER").unwrap_or(defaults.sender_address),
                sender_name: optional("MAIL_SENDER_NAME").unwrap_or(defaults.sender_name),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every required value is present and non-empty.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("database_url", self.database_url.as_str()),
            ("upload_dir", self.upload_dir.as_str()),
            ("admin.username", self.admin.username.as_str()),
            ("admin.password", self.admin.password.as_str()),
            ("admin.token_secret", self.admin.token_secret.as_str()),
            ("mail.sender_address", self.mail.sender_address.as_str()),
        ];
        for (key, value) in checks {
            if value.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("'{key}' must not be empty"),
                });
            }
        }
        if Path::new(&self.upload_dir).is_absolute() {
            return Err(Error::Config {
                message: "'upload_dir' must be relative to 'assets_root'".to_string(),
            });
        }
        Ok(())
    }
}

/// Loads and validates configuration from a TOML file.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing or empty
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config file: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}
