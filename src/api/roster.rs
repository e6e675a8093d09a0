//! Roster view projection endpoints.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;

use super::{success, ApiResponse, ApiResult};
use crate::errors::AppError;
use crate::export::ExportFile;
use crate::roster::{dispatch, Intent, ViewState};
use crate::AppState;

/// GET /api/roster/view - Current view state.
///
/// Served from the published snapshot, so it answers while an intent is still
/// waiting on the collection.
pub async fn get_view(State(state): State<AppState>) -> ApiResult<ViewState> {
    let view = state.view.borrow().clone();
    success(view)
}

/// POST /api/roster/intents - Apply one user intent.
///
/// Responds with the updated view, or with the file when the intent produced an export.
/// The intent runs on its own task and finishes even if the client goes away.
pub async fn post_intent(State(state): State<AppState>, Json(intent): Json<Intent>) -> Response {
    let roster = state.roster.clone();
    let task = tokio::spawn(async move {
        let mut controller = roster.lock().await;
        let outcome = dispatch(&mut controller, intent).await;
        (outcome, ViewState::project(&controller, &Local))
    });

    match task.await {
        Ok((Ok(Some(file)), _)) => download(file),
        Ok((Ok(None), view)) => ApiResponse::new(view).into_response(),
        Ok((Err(e), _)) => e.into_response(),
        Err(e) => AppError::Internal(format!("Intent task failed: {}", e)).into_response(),
    }
}

fn download(file: ExportFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response()
}
