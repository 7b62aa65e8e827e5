//! HTTP handlers for export order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ActualItem, ExportOrder, PaginatedResponse};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::export_order::{
    CreateExportOrderInput, ExportOrderFilter, ExportOrderService, ExportOrderWithDetails,
    ExportTransitionInput, OutstandingResponse, RecordPickInput,
};
use crate::services::import_order::AssignManagerInput;
use crate::AppState;

/// Create an export order
pub async fn create_export_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateExportOrderInput>,
) -> AppResult<(StatusCode, Json<ExportOrderWithDetails>)> {
    let service = ExportOrderService::new(state.db);
    let order = service.create_order(&current_user.0.context(), input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List export orders visible to the caller
pub async fn list_export_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ExportOrderFilter>,
) -> AppResult<Json<PaginatedResponse<ExportOrder>>> {
    let service = ExportOrderService::new(state.db);
    let orders = service.list_orders(&current_user.0.context(), filter).await?;
    Ok(Json(orders))
}

/// Get an export order with lines and picked items
pub async fn get_export_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ExportOrderWithDetails>> {
    let service = ExportOrderService::new(state.db);
    let order = service.get_order(&current_user.0.context(), order_id).await?;
    Ok(Json(order))
}

/// Change the status of an export order
pub async fn transition_export_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ExportTransitionInput>,
) -> AppResult<Json<ExportOrder>> {
    let service = ExportOrderService::new(state.db);
    let order = service
        .transition(&current_user.0.context(), order_id, input)
        .await?;
    Ok(Json(order))
}

/// Assign the warehouse manager of an export order
pub async fn assign_export_manager(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<AssignManagerInput>,
) -> AppResult<Json<ExportOrder>> {
    let service = ExportOrderService::new(state.db);
    let order = service
        .assign_warehouse_manager(&current_user.0.context(), order_id, input)
        .await?;
    Ok(Json(order))
}

/// Delete a draft or cancelled export order
pub async fn delete_export_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = ExportOrderService::new(state.db);
    service.delete_order(&current_user.0.context(), order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Outstanding need per line with candidate packages
pub async fn packages_needed(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OutstandingResponse>> {
    let service = ExportOrderService::new(state.db);
    let outstanding = service.outstanding(&current_user.0.context(), order_id).await?;
    Ok(Json(outstanding))
}

/// Record a pick against an export line
pub async fn record_pick(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((order_id, detail_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<RecordPickInput>,
) -> AppResult<(StatusCode, Json<ActualItem>)> {
    let service = ExportOrderService::new(state.db);
    let item = service
        .record_pick(&current_user.0.context(), order_id, detail_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Finish an export order once every line is picked
pub async fn complete_export_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ExportOrder>> {
    let service = ExportOrderService::new(state.db);
    let order = service.complete_order(&current_user.0.context(), order_id).await?;
    Ok(Json(order))
}
