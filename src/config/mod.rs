/// Database connection and table management
pub mod database;

/// Application settings loaded from config.toml or the environment
pub mod settings;

pub use settings::{AdminCredentials, AppConfig, MailSettings, load_config};
