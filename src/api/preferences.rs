//! Preference endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::preferences::Theme;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ThemeBody {
    pub theme: Theme,
}

/// GET /api/preferences/theme - Current theme.
pub async fn get_theme(State(state): State<AppState>) -> ApiResult<ThemeBody> {
    let prefs = state.preferences.read().await;
    success(ThemeBody {
        theme: prefs.theme(),
    })
}

/// PUT /api/preferences/theme - Change and persist the theme.
pub async fn set_theme(
    State(state): State<AppState>,
    Json(body): Json<ThemeBody>,
) -> ApiResult<ThemeBody> {
    let mut prefs = state.preferences.write().await;
    prefs.set(body.theme)?;
    success(ThemeBody {
        theme: prefs.theme(),
    })
}
