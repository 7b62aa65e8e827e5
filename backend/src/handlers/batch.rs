//! HTTP handlers for batch endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use shared::Batch;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::batch::{BatchFilter, BatchService, CreateBatchInput};
use crate::AppState;

/// Declare a batch
pub async fn create_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    let service = BatchService::new(state.db);
    let batch = service.create_batch(&current_user.0.context(), input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// List batches, optionally for one medicine
pub async fn list_batches(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<BatchFilter>,
) -> AppResult<Json<Vec<Batch>>> {
    let service = BatchService::new(state.db);
    let batches = service.list_batches(filter).await?;
    Ok(Json(batches))
}
