//! HTTP handlers for user lookups

use axum::{extract::State, Json};
use shared::User;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::UserService;
use crate::AppState;

/// Active warehouse managers eligible for order assignment
pub async fn list_warehouse_managers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<User>>> {
    let service = UserService::new(state.db);
    let managers = service.list_warehouse_managers().await?;
    Ok(Json(managers))
}
