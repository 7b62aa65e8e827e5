//! HTTP handlers for alert endpoints

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::alert::{AlertService, BillDue, ExpiringStock, LowStock};
use crate::AppState;

fn service(state: &AppState) -> AlertService {
    AlertService::new(state.db.clone(), state.config.alerts.clone())
}

/// Stock in lots expiring within the warning window
pub async fn expiring_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ExpiringStock>>> {
    Ok(Json(service(&state).expiring_stock().await?))
}

/// Medicines below their minimum stock
pub async fn low_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<LowStock>>> {
    Ok(Json(service(&state).low_stock().await?))
}

/// Unpaid bills falling due
pub async fn bills_due(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<BillDue>>> {
    Ok(Json(service(&state).bills_due().await?))
}
