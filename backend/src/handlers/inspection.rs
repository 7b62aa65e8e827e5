//! HTTP handlers for inspection endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Inspection, InspectionEntry};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inspection::{InspectionService, InspectionSubmission, UpdateInspectionInput};
use crate::AppState;

/// Record a batch of inspections
pub async fn create_inspections(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(submission): Json<InspectionSubmission>,
) -> AppResult<(StatusCode, Json<Vec<Inspection>>)> {
    let service = InspectionService::new(state.db);
    let created = service
        .create_inspections(&current_user.0.context(), submission.into_entries())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Record a single inspection
pub async fn create_single_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(entry): Json<InspectionEntry>,
) -> AppResult<(StatusCode, Json<Inspection>)> {
    let service = InspectionService::new(state.db);
    let created = service.create_single(&current_user.0.context(), entry).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Re-enter the quantities of an inspection
pub async fn update_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
    Json(input): Json<UpdateInspectionInput>,
) -> AppResult<Json<Inspection>> {
    let service = InspectionService::new(state.db);
    let inspection = service
        .update_inspection(&current_user.0.context(), inspection_id, input)
        .await?;
    Ok(Json(inspection))
}

/// Delete an inspection
pub async fn delete_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = InspectionService::new(state.db);
    service
        .delete_inspection(&current_user.0.context(), inspection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
