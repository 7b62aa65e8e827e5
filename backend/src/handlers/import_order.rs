//! HTTP handlers for import order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ImportOrder, Inspection, Package, PaginatedResponse};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::import_order::{
    AssignManagerInput, CreateImportOrderInput, ImportOrderFilter, ImportOrderService,
    ImportOrderWithDetails, TransitionInput, TransitionResult, UpdateImportOrderInput,
};
use crate::services::packaging::{PackagingInput, PackagingResult, PackagingService};
use crate::services::{InspectionService, PackageService};
use crate::AppState;

fn service(state: &AppState) -> ImportOrderService {
    ImportOrderService::new(state.db.clone(), state.config.billing.clone())
}

/// Create an import order
pub async fn create_import_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateImportOrderInput>,
) -> AppResult<(StatusCode, Json<ImportOrderWithDetails>)> {
    let order = service(&state)
        .create_order(&current_user.0.context(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List import orders visible to the caller
pub async fn list_import_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ImportOrderFilter>,
) -> AppResult<Json<PaginatedResponse<ImportOrder>>> {
    let orders = service(&state)
        .list_orders(&current_user.0.context(), filter)
        .await?;
    Ok(Json(orders))
}

/// Get an import order with its lines
pub async fn get_import_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ImportOrderWithDetails>> {
    let order = service(&state)
        .get_order(&current_user.0.context(), order_id)
        .await?;
    Ok(Json(order))
}

/// Update lines and optionally the status of an import order
pub async fn update_import_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateImportOrderInput>,
) -> AppResult<Json<ImportOrderWithDetails>> {
    let order = service(&state)
        .update_order(&current_user.0.context(), order_id, input)
        .await?;
    Ok(Json(order))
}

/// Delete a draft or cancelled import order
pub async fn delete_import_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state)
        .delete_order(&current_user.0.context(), order_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change the status of an import order
pub async fn transition_import_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<TransitionInput>,
) -> AppResult<Json<TransitionResult>> {
    let result = service(&state)
        .transition(&current_user.0.context(), order_id, input)
        .await?;
    Ok(Json(result))
}

/// Assign the warehouse manager of an import order
pub async fn assign_import_manager(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<AssignManagerInput>,
) -> AppResult<Json<ImportOrder>> {
    let order = service(&state)
        .assign_warehouse_manager(&current_user.0.context(), order_id, input)
        .await?;
    Ok(Json(order))
}

/// List the inspections of an import order
pub async fn list_order_inspections(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<Inspection>>> {
    let service = InspectionService::new(state.db);
    let inspections = service
        .list_by_order(&current_user.0.context(), order_id)
        .await?;
    Ok(Json(inspections))
}

/// List the packages of an import order
pub async fn list_order_packages(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<Package>>> {
    let service = PackageService::new(state.db);
    let packages = service
        .list_by_order(&current_user.0.context(), order_id)
        .await?;
    Ok(Json(packages))
}

/// Packaging step: declare batches, create packages, arrange the order
pub async fn package_import_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<PackagingInput>,
) -> AppResult<(StatusCode, Json<PackagingResult>)> {
    let service = PackagingService::new(state.db);
    let result = service
        .package_order(&current_user.0.context(), order_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Finalize an import order once every package is located
pub async fn complete_import_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<TransitionResult>> {
    let result = service(&state)
        .complete_order(&current_user.0.context(), order_id)
        .await?;
    Ok(Json(result))
}
