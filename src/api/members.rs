//! Member collection endpoints.
//!
//! This is the record collection other instances reach through `HttpStore`.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{Member, NewMember};
use crate::AppState;

/// GET /api/members - List all members, newest first.
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Vec<Member>> {
    success(state.collection.list_members().await?)
}

/// GET /api/members/:id - Get a single member.
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Member> {
    match state.collection.get_member(&id).await? {
        Some(member) => success(member),
        None => Err(AppError::NotFound(format!("Member {} not found", id))),
    }
}

/// POST /api/members - Insert a member.
pub async fn create_member(
    State(state): State<AppState>,
    Json(request): Json<NewMember>,
) -> ApiResult<Member> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation { missing });
    }

    success(state.collection.create_member(&request).await?)
}

/// DELETE /api/members/:id - Delete a member.
pub async fn delete_member(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.collection.delete_member(&id).await?;
    success(())
}
