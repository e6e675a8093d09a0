//! Configuration module for the roster service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::collections::BTreeSet;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;
use crate::export::ExportFormat;
use crate::preferences::Theme;
use crate::roster::RosterFeatures;

const DEFAULT_PASSPHRASE: &str = "12345";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Base URL of a remote collection; the local database is used when unset
    pub store_url: Option<String>,
    /// Upper bound on each remote collection request
    pub store_timeout: Duration,
    /// Shared passphrase for gated actions (a confirmation step, not a secret)
    pub passphrase: String,
    /// Controller behavior switches
    pub features: RosterFeatures,
    /// Path to the persisted preference file
    pub prefs_path: PathBuf,
    /// Theme used when no preference has been saved yet
    pub system_theme: Theme,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("ROSTER_DB_PATH")
            .unwrap_or_else(|_| "./data/roster.sqlite".to_string())
            .into();

        let bind_addr = env::var("ROSTER_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Internal(format!("Invalid ROSTER_BIND_ADDR format: {}", e)))?;

        let log_level = env::var("ROSTER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store_url = env::var("ROSTER_STORE_URL").ok().filter(|s| !s.is_empty());
        let store_timeout = env::var("ROSTER_STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                AppError::Internal(format!("Invalid ROSTER_STORE_TIMEOUT_SECS value: {}", e))
            })?;

        let passphrase =
            env::var("ROSTER_PASSPHRASE").unwrap_or_else(|_| DEFAULT_PASSPHRASE.to_string());

        let features = RosterFeatures {
            team_role_fields: env_flag("ROSTER_TEAM_ROLE_FIELDS", true)?,
            export_formats: export_formats(
                &env::var("ROSTER_EXPORT_FORMATS")
                    .unwrap_or_else(|_| "document,spreadsheet".to_string()),
            )?,
            delete_gated: env_flag("ROSTER_DELETE_GATED", true)?,
            document_export_gated: env_flag("ROSTER_DOCUMENT_EXPORT_GATED", true)?,
            spreadsheet_export_gated: env_flag("ROSTER_SPREADSHEET_EXPORT_GATED", false)?,
        };

        let prefs_path = env::var("ROSTER_PREFS_PATH")
            .unwrap_or_else(|_| "./data/preferences.json".to_string())
            .into();

        let system_theme = env::var("ROSTER_SYSTEM_THEME")
            .unwrap_or_else(|_| "light".to_string())
            .parse::<Theme>()?;

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            store_url,
            store_timeout,
            passphrase,
            features,
            prefs_path,
            system_theme,
        })
    }
}

fn env_flag(name: &str, default: bool) -> Result<bool, AppError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => parse_flag(&value)
            .ok_or_else(|| AppError::Internal(format!("Invalid {} value '{}'", name, value))),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn export_formats(value: &str) -> Result<BTreeSet<ExportFormat>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<ExportFormat>)
        .collect()
}
