//! Route definitions for the Pharmaceutical Warehouse Management System

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/import-orders", import_order_routes())
        .nest("/export-orders", export_order_routes())
        .nest("/inspections", inspection_routes())
        .nest("/batch", batch_routes())
        .nest("/packages", package_routes())
        .nest("/alerts", alert_routes())
        .nest("/users", user_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

/// Import order routes (protected)
fn import_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_import_orders).post(handlers::create_import_order),
        )
        .route(
            "/:id",
            get(handlers::get_import_order)
                .patch(handlers::update_import_order)
                .delete(handlers::delete_import_order),
        )
        .route("/:id/status", patch(handlers::transition_import_order))
        .route(
            "/:id/assign-warehouse-manager",
            patch(handlers::assign_import_manager),
        )
        .route("/:id/inspections", get(handlers::list_order_inspections))
        .route("/:id/packages", get(handlers::list_order_packages))
        .route("/:id/packaging", post(handlers::package_import_order))
        .route("/:id/complete", post(handlers::complete_import_order))
}

/// Export order routes (protected)
fn export_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_export_orders).post(handlers::create_export_order),
        )
        .route(
            "/:id",
            get(handlers::get_export_order).delete(handlers::delete_export_order),
        )
        .route("/:id/status", patch(handlers::transition_export_order))
        .route(
            "/:id/assign-warehouse-manager",
            patch(handlers::assign_export_manager),
        )
        .route("/:id/packages-needed", get(handlers::packages_needed))
        .route(
            "/:id/details/:detail_id/inspections",
            post(handlers::record_pick),
        )
        .route("/:id/complete", post(handlers::complete_export_order))
}

/// Inspection routes (protected)
fn inspection_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_inspections))
        .route("/single", post(handlers::create_single_inspection))
        .route(
            "/:id",
            patch(handlers::update_inspection).delete(handlers::delete_inspection),
        )
}

/// Batch routes (protected)
fn batch_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_batches).post(handlers::create_batch))
}

/// Package and put-away routes (protected)
fn package_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_package))
        .route("/unarranged", get(handlers::list_unarranged_packages))
        .route("/:id/location", patch(handlers::assign_package_location))
        .route("/:id/clear-location", patch(handlers::clear_package_location))
        .route("/:id/quantity", patch(handlers::override_package_quantity))
}

/// Alert routes (protected)
fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/expiring", get(handlers::expiring_stock))
        .route("/low-stock", get(handlers::low_stock))
        .route("/bills-due", get(handlers::bills_due))
}

/// User lookup routes (protected)
fn user_routes() -> Router<AppState> {
    Router::new().route("/warehouse-managers", get(handlers::list_warehouse_managers))
}
