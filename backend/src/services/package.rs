//! Package service: single package creation, put-away and supervisor overrides

use serde::{Deserialize, Serialize};
use shared::{ensure_stock_handler, DomainError, ImportOrderStatus, Package, UserContext};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::import_order::{ensure_visible, fetch_order};

/// Package service
#[derive(Clone)]
pub struct PackageService {
    db: PgPool,
}

/// Input for creating a single package
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePackageInput {
    pub import_order_id: Uuid,
    pub batch_id: Uuid,
    #[validate(range(min = 1, message = "Package quantity must be positive"))]
    pub quantity: i32,
}

/// Input for put-away
#[derive(Debug, Deserialize)]
pub struct AssignLocationInput {
    pub location_id: Uuid,
}

/// Input for a supervisor quantity override
#[derive(Debug, Deserialize, Validate)]
pub struct OverrideQuantityInput {
    #[validate(range(min = 0, message = "Package quantity cannot be negative"))]
    pub quantity: i32,
}

/// Package awaiting put-away, with what the put-away screen shows
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UnarrangedPackage {
    pub id: Uuid,
    pub import_order_id: Uuid,
    pub batch_id: Uuid,
    pub batch_code: String,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub quantity: i32,
}

impl PackageService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create one package on an order in the packaging stage
    pub async fn create_package(&self, ctx: &UserContext, input: CreatePackageInput) -> AppResult<Package> {
        input.validate()?;
        ensure_stock_handler(ctx, "handle packages")?;

        let order = fetch_order(&self.db, input.import_order_id).await?;
        ensure_visible(ctx, &order)?;
        if order.status != ImportOrderStatus::Checked {
            return Err(AppError::InvalidState(format!(
                "Packages can only be created while the order is checked (current status: '{}')",
                order.status
            )));
        }

        let batch_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM batches WHERE id = $1)")
                .bind(input.batch_id)
                .fetch_one(&self.db)
                .await?;
        if !batch_exists {
            return Err(AppError::NotFound("Batch".to_string()));
        }

        let package = sqlx::query_as::<_, Package>(
            r#"
            INSERT INTO packages (import_order_id, batch_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, import_order_id, batch_id, quantity, location_id, created_at, updated_at
            "#,
        )
        .bind(input.import_order_id)
        .bind(input.batch_id)
        .bind(input.quantity)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(package_id = %package.id, order_id = %order.id, "Package created");

        Ok(package)
    }

    /// Put a package on a shelf location
    pub async fn assign_location(
        &self,
        ctx: &UserContext,
        package_id: Uuid,
        input: AssignLocationInput,
    ) -> AppResult<Package> {
        ensure_stock_handler(ctx, "handle packages")?;

        let location_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM locations WHERE id = $1)")
                .bind(input.location_id)
                .fetch_one(&self.db)
                .await?;
        if !location_exists {
            return Err(AppError::NotFound("Location".to_string()));
        }

        let package = sqlx::query_as::<_, Package>(
            r#"
            UPDATE packages SET location_id = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, import_order_id, batch_id, quantity, location_id, created_at, updated_at
            "#,
        )
        .bind(input.location_id)
        .bind(package_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Package".to_string()))?;

        tracing::info!(package_id = %package_id, location_id = %input.location_id, "Package located");

        Ok(package)
    }

    /// Take a package off its location; the package itself stays
    pub async fn clear_location(&self, ctx: &UserContext, package_id: Uuid) -> AppResult<Package> {
        ensure_stock_handler(ctx, "handle packages")?;

        let package = sqlx::query_as::<_, Package>(
            r#"
            UPDATE packages SET location_id = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING id, import_order_id, batch_id, quantity, location_id, created_at, updated_at
            "#,
        )
        .bind(package_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Package".to_string()))?;

        tracing::info!(package_id = %package_id, "Package location cleared");

        Ok(package)
    }

    /// Supervisor override of a package quantity
    ///
    /// Skips reconciliation entirely; every use is logged at warn level.
    pub async fn override_quantity(
        &self,
        ctx: &UserContext,
        package_id: Uuid,
        input: OverrideQuantityInput,
    ) -> AppResult<Package> {
        if !ctx.role.is_supervisor() {
            return Err(DomainError::Forbidden(format!(
                "Role '{}' cannot override package quantities",
                ctx.role
            ))
            .into());
        }
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let previous: i32 =
            sqlx::query_scalar("SELECT quantity FROM packages WHERE id = $1 FOR UPDATE")
                .bind(package_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Package".to_string()))?;

        let package = sqlx::query_as::<_, Package>(
            r#"
            UPDATE packages SET quantity = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, import_order_id, batch_id, quantity, location_id, created_at, updated_at
            "#,
        )
        .bind(input.quantity)
        .bind(package_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::warn!(
            package_id = %package_id,
            user_id = %ctx.user_id,
            previous,
            quantity = input.quantity,
            "Package quantity overridden by supervisor"
        );

        Ok(package)
    }

    /// Packages of one import order
    pub async fn list_by_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<Vec<Package>> {
        let order = fetch_order(&self.db, order_id).await?;
        ensure_visible(ctx, &order)?;

        let packages = sqlx::query_as::<_, Package>(
            r#"
            SELECT id, import_order_id, batch_id, quantity, location_id, created_at, updated_at
            FROM packages
            WHERE import_order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(packages)
    }

    /// Packages still waiting for a location
    pub async fn list_unarranged(&self) -> AppResult<Vec<UnarrangedPackage>> {
        let packages = sqlx::query_as::<_, UnarrangedPackage>(
            r#"
            SELECT p.id, p.import_order_id, p.batch_id, b.batch_code, b.medicine_id,
                   m.name AS medicine_name, p.quantity
            FROM packages p
            JOIN batches b ON b.id = p.batch_id
            JOIN medicines m ON m.id = b.medicine_id
            WHERE p.location_id IS NULL AND p.quantity > 0
            ORDER BY p.created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(packages)
    }
}
