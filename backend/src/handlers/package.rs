//! HTTP handlers for package and put-away endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Package;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::package::{
    AssignLocationInput, CreatePackageInput, OverrideQuantityInput, PackageService,
    UnarrangedPackage,
};
use crate::AppState;

/// Create a single package
pub async fn create_package(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePackageInput>,
) -> AppResult<(StatusCode, Json<Package>)> {
    let service = PackageService::new(state.db);
    let package = service.create_package(&current_user.0.context(), input).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// Packages waiting for put-away
pub async fn list_unarranged_packages(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<UnarrangedPackage>>> {
    let service = PackageService::new(state.db);
    let packages = service.list_unarranged().await?;
    Ok(Json(packages))
}

/// Put a package on a location
pub async fn assign_package_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(package_id): Path<Uuid>,
    Json(input): Json<AssignLocationInput>,
) -> AppResult<Json<Package>> {
    let service = PackageService::new(state.db);
    let package = service
        .assign_location(&current_user.0.context(), package_id, input)
        .await?;
    Ok(Json(package))
}

/// Clear the location of a package
pub async fn clear_package_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(package_id): Path<Uuid>,
) -> AppResult<Json<Package>> {
    let service = PackageService::new(state.db);
    let package = service
        .clear_location(&current_user.0.context(), package_id)
        .await?;
    Ok(Json(package))
}

/// Supervisor override of a package quantity
pub async fn override_package_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(package_id): Path<Uuid>,
    Json(input): Json<OverrideQuantityInput>,
) -> AppResult<Json<Package>> {
    let service = PackageService::new(state.db);
    let package = service
        .override_quantity(&current_user.0.context(), package_id, input)
        .await?;
    Ok(Json(package))
}
