//! Persisted client preferences.
//!
//! Holds the light/dark theme choice. Kept apart from the roster controller;
//! every change is written straight through to a small JSON file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(AppError::BadRequest(format!("Unknown theme '{}'", other))),
        }
    }
}

/// On-disk shape: a single key-value pair.
#[derive(Debug, Serialize, Deserialize)]
struct StoredPreference {
    theme: Theme,
}

/// Theme preference with write-through persistence.
#[derive(Debug)]
pub struct ThemePreference {
    path: PathBuf,
    theme: Theme,
}

impl ThemePreference {
    /// Read the persisted theme, falling back to `system_default` when the
    /// file is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>, system_default: Theme) -> Self {
        let path = path.into();
        let theme = match read_stored(&path) {
            Ok(Some(theme)) => theme,
            Ok(None) => system_default,
            Err(e) => {
                tracing::warn!("Ignoring unreadable preferences at {:?}: {}", path, e);
                system_default
            }
        };
        Self { path, theme }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Change the theme and persist it before returning.
    pub fn set(&mut self, theme: Theme) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&StoredPreference { theme })?;
        std::fs::write(&self.path, json)?;

        self.theme = theme;
        tracing::info!("Theme set to {:?}", theme);
        Ok(())
    }
}

fn read_stored(path: &Path) -> Result<Option<Theme>, AppError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    let stored: StoredPreference = serde_json::from_slice(&bytes)?;
    Ok(Some(stored.theme))
}
