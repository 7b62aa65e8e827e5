//! Export order service: outbound orders, picking and completion

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    authorize_export_transition, check_manager_assignment, compute_outstanding,
    ensure_export_deletable, ensure_fully_picked, ensure_stock_handler, plan_export_creation,
    validate_export_lines, validate_pick, ActualItem, ApprovalChange, ExportLineProgress,
    ExportOrder, ExportOrderDetail, ExportOrderStatus, ImportOrderStatus, OrderLine, OutstandingLine,
    PaginatedResponse, Pagination, PaginationMeta, StockPackage, TransitionPlan, UserContext,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::import_order::{fetch_user, AssignManagerInput};

/// Export order service
#[derive(Clone)]
pub struct ExportOrderService {
    db: PgPool,
}

/// Input for creating an export order
#[derive(Debug, Deserialize)]
pub struct CreateExportOrderInput {
    pub contract_id: Option<Uuid>,
    #[serde(alias = "order_details")]
    pub details: Vec<OrderLine>,
}

/// Input for an export status change
#[derive(Debug, Deserialize)]
pub struct ExportTransitionInput {
    pub status: ExportOrderStatus,
    #[serde(default)]
    pub bypass: bool,
}

/// Filters for listing export orders
#[derive(Debug, Default, Deserialize)]
pub struct ExportOrderFilter {
    pub status: Option<ExportOrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Input for recording a pick
#[derive(Debug, Deserialize)]
pub struct RecordPickInput {
    pub package_id: Uuid,
    /// Identifier scanned or typed by the operator; must match `package_id`
    pub confirm_package_id: Uuid,
    pub quantity: i32,
}

/// Export line with what has been picked for it
#[derive(Debug, Clone, Serialize)]
pub struct ExportLine {
    #[serde(flatten)]
    pub detail: ExportOrderDetail,
    pub actual_items: Vec<ActualItem>,
}

/// Export order with its lines
#[derive(Debug, Clone, Serialize)]
pub struct ExportOrderWithDetails {
    #[serde(flatten)]
    pub order: ExportOrder,
    pub details: Vec<ExportLine>,
}

/// Remaining need of an export order
#[derive(Debug, Clone, Serialize)]
pub struct OutstandingResponse {
    pub outstanding: Vec<OutstandingLine>,
}

impl ExportOrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an export order with its lines
    pub async fn create_order(
        &self,
        ctx: &UserContext,
        input: CreateExportOrderInput,
    ) -> AppResult<ExportOrderWithDetails> {
        let plan = plan_export_creation(ctx, input.contract_id.is_some())?;
        validate_export_lines(&input.details)?;

        let mut tx = self.db.begin().await?;

        let prices: HashMap<Uuid, Decimal> = match input.contract_id {
            Some(contract_id) => contract_prices(&mut tx, contract_id).await?,
            None => HashMap::new(),
        };

        let order = sqlx::query_as::<_, ExportOrder>(
            r#"
            INSERT INTO export_orders (contract_id, warehouse_manager_id, status, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, contract_id, warehouse_manager_id, status, created_by, approved_by,
                      created_at, updated_at
            "#,
        )
        .bind(input.contract_id)
        .bind(plan.warehouse_manager_id)
        .bind(plan.status.as_str())
        .bind(ctx.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut details = Vec::with_capacity(input.details.len());
        for (line_no, line) in (1i32..).zip(&input.details) {
            let unit_price = line
                .unit_price
                .or_else(|| prices.get(&line.medicine_id).copied())
                .unwrap_or(Decimal::ZERO);

            let detail = sqlx::query_as::<_, ExportOrderDetail>(
                r#"
                INSERT INTO export_order_details (export_order_id, line_no, medicine_id, expected_quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, export_order_id, medicine_id, expected_quantity, unit_price
                "#,
            )
            .bind(order.id)
            .bind(line_no)
            .bind(line.medicine_id)
            .bind(line.quantity)
            .bind(unit_price)
            .fetch_one(&mut *tx)
            .await?;

            details.push(ExportLine {
                detail,
                actual_items: Vec::new(),
            });
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            internal = order.is_internal(),
            "Export order created"
        );

        Ok(ExportOrderWithDetails { order, details })
    }

    /// Get an export order with its lines and picked items
    pub async fn get_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<ExportOrderWithDetails> {
        let order = fetch_order(&self.db, order_id).await?;
        ensure_visible(ctx, &order)?;

        let details = sqlx::query_as::<_, ExportOrderDetail>(
            r#"
            SELECT id, export_order_id, medicine_id, expected_quantity, unit_price
            FROM export_order_details
            WHERE export_order_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        let items = sqlx::query_as::<_, ActualItem>(
            r#"
            SELECT k.id, k.export_order_detail_id, k.package_id, k.quantity, k.picked_by, k.created_at
            FROM export_order_picks k
            JOIN export_order_details d ON d.id = k.export_order_detail_id
            WHERE d.export_order_id = $1
            ORDER BY k.created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        let mut items_by_detail: HashMap<Uuid, Vec<ActualItem>> = HashMap::new();
        for item in items {
            items_by_detail
                .entry(item.export_order_detail_id)
                .or_default()
                .push(item);
        }

        let details = details
            .into_iter()
            .map(|detail| ExportLine {
                actual_items: items_by_detail.remove(&detail.id).unwrap_or_default(),
                detail,
            })
            .collect();

        Ok(ExportOrderWithDetails { order, details })
    }

    /// List export orders, newest first
    pub async fn list_orders(
        &self,
        ctx: &UserContext,
        filter: ExportOrderFilter,
    ) -> AppResult<PaginatedResponse<ExportOrder>> {
        let pagination = Pagination::new(filter.page, filter.limit);
        let status = filter.status.map(|s| s.as_str());
        let contract_only = ctx.role.is_representative();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM export_orders
            WHERE ($1::VARCHAR IS NULL OR status = $1)
              AND (NOT $2 OR contract_id IS NOT NULL)
            "#,
        )
        .bind(status)
        .bind(contract_only)
        .fetch_one(&self.db)
        .await?;

        let orders = sqlx::query_as::<_, ExportOrder>(
            r#"
            SELECT id, contract_id, warehouse_manager_id, status, created_by, approved_by,
                   created_at, updated_at
            FROM export_orders
            WHERE ($1::VARCHAR IS NULL OR status = $1)
              AND (NOT $2 OR contract_id IS NOT NULL)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(status)
        .bind(contract_only)
        .bind(i64::from(pagination.limit))
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: orders,
            pagination: PaginationMeta::new(&pagination, u64::try_from(total).unwrap_or(0)),
        })
    }

    /// Change the status of an export order
    ///
    /// Completion also requires every line to be picked in full.
    pub async fn transition(
        &self,
        ctx: &UserContext,
        order_id: Uuid,
        input: ExportTransitionInput,
    ) -> AppResult<ExportOrder> {
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        ensure_visible(ctx, &order)?;

        let plan = authorize_export_transition(
            order.status,
            input.status,
            order.is_internal(),
            ctx,
            input.bypass,
        )?;

        if plan.bypassed {
            tracing::warn!(
                order_id = %order_id,
                user_id = %ctx.user_id,
                from = %plan.from,
                to = %plan.to,
                "Supervisor bypassed the export transition table"
            );
        }

        if plan.to == ExportOrderStatus::Completed {
            let progress = line_progress(&mut tx, order_id).await?;
            ensure_fully_picked(&progress)?;
        }

        let updated = write_status(&mut tx, order_id, &plan).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            from = %plan.from,
            to = %plan.to,
            "Export order status changed"
        );

        Ok(updated)
    }

    /// Finish an export order once nothing is left to pick
    pub async fn complete_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<ExportOrder> {
        self.transition(
            ctx,
            order_id,
            ExportTransitionInput {
                status: ExportOrderStatus::Completed,
                bypass: false,
            },
        )
        .await
    }

    /// Assign a warehouse manager; allowed only once per order
    pub async fn assign_warehouse_manager(
        &self,
        ctx: &UserContext,
        order_id: Uuid,
        input: AssignManagerInput,
    ) -> AppResult<ExportOrder> {
        let order = fetch_order(&self.db, order_id).await?;
        ensure_visible(ctx, &order)?;

        if order.status.is_frozen() || order.status == ExportOrderStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Export order is '{}' and can no longer change",
                order.status
            )));
        }

        let candidate = fetch_user(&self.db, input.warehouse_manager_id).await?;
        let manager_id = check_manager_assignment(
            order.warehouse_manager_id,
            input.warehouse_manager_id,
            candidate.as_ref(),
        )?;

        let updated = sqlx::query_as::<_, ExportOrder>(
            r#"
            UPDATE export_orders
            SET warehouse_manager_id = $1, updated_at = NOW()
            WHERE id = $2 AND warehouse_manager_id IS NULL
            RETURNING id, contract_id, warehouse_manager_id, status, created_by, approved_by,
                      created_at, updated_at
            "#,
        )
        .bind(manager_id)
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::AlreadyAssigned)?;

        tracing::info!(order_id = %order_id, manager_id = %manager_id, "Warehouse manager assigned");

        Ok(updated)
    }

    /// Delete an export order (draft or cancelled, with nothing picked)
    pub async fn delete_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        ensure_visible(ctx, &order)?;

        let picked_units: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(k.quantity), 0)::BIGINT
            FROM export_order_picks k
            JOIN export_order_details d ON d.id = k.export_order_detail_id
            WHERE d.export_order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_export_deletable(order.status, picked_units)?;

        let result = sqlx::query("DELETE FROM export_orders WHERE id = $1 AND status = $2")
            .bind(order_id)
            .bind(order.status.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentModification(format!(
                "Export order {} changed while it was being deleted",
                order_id
            )));
        }

        tx.commit().await?;

        tracing::info!(order_id = %order_id, "Export order deleted");

        Ok(())
    }

    /// What is still to pick per line, with candidate packages
    pub async fn outstanding(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<OutstandingResponse> {
        let order = fetch_order(&self.db, order_id).await?;
        ensure_visible(ctx, &order)?;

        let mut conn = self.db.acquire().await?;
        let progress = line_progress(&mut conn, order_id).await?;

        let medicine_ids: Vec<Uuid> = progress.iter().map(|line| line.medicine_id).collect();
        let stock = stock_for_medicines(&mut conn, &medicine_ids).await?;

        Ok(OutstandingResponse {
            outstanding: compute_outstanding(&progress, &stock, Utc::now().date_naive()),
        })
    }

    /// Record a pick from one package against one export line
    ///
    /// Line and package rows are locked, the allowance is re-checked, and the
    /// pick is appended while the package quantity is decremented.
    pub async fn record_pick(
        &self,
        ctx: &UserContext,
        order_id: Uuid,
        detail_id: Uuid,
        input: RecordPickInput,
    ) -> AppResult<ActualItem> {
        ensure_stock_handler(ctx, "pick stock")?;

        let today = Utc::now().date_naive();
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        if order.status != ExportOrderStatus::Approved {
            return Err(AppError::InvalidState(format!(
                "Picking requires an approved export order (current status: '{}')",
                order.status
            )));
        }

        let detail = sqlx::query_as::<_, ExportOrderDetail>(
            r#"
            SELECT id, export_order_id, medicine_id, expected_quantity, unit_price
            FROM export_order_details
            WHERE id = $1 AND export_order_id = $2
            FOR UPDATE
            "#,
        )
        .bind(detail_id)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Export order detail".to_string()))?;

        let picked: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM export_order_picks WHERE export_order_detail_id = $1",
        )
        .bind(detail_id)
        .fetch_one(&mut *tx)
        .await?;

        let line = ExportLineProgress {
            detail_id,
            medicine_id: detail.medicine_id,
            expected_quantity: detail.expected_quantity,
            picked,
        };

        let package = lock_stock_package(&mut tx, input.package_id).await?;
        validate_pick(&line, &package, input.confirm_package_id, input.quantity, today)?;

        let item = sqlx::query_as::<_, ActualItem>(
            r#"
            INSERT INTO export_order_picks (export_order_detail_id, package_id, quantity, picked_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, export_order_detail_id, package_id, quantity, picked_by, created_at
            "#,
        )
        .bind(detail_id)
        .bind(input.package_id)
        .bind(input.quantity)
        .bind(ctx.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE packages SET quantity = quantity - $1, updated_at = NOW()
            WHERE id = $2 AND quantity >= $1
            "#,
        )
        .bind(input.quantity)
        .bind(input.package_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentModification(format!(
                "Package {} no longer holds {} units",
                input.package_id, input.quantity
            )));
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            detail_id = %detail_id,
            package_id = %input.package_id,
            quantity = input.quantity,
            "Pick recorded"
        );

        Ok(item)
    }
}

fn ensure_visible(ctx: &UserContext, order: &ExportOrder) -> AppResult<()> {
    if ctx.role.is_representative() && order.is_internal() {
        return Err(AppError::NotFound("Export order".to_string()));
    }
    Ok(())
}

async fn fetch_order(db: &PgPool, order_id: Uuid) -> AppResult<ExportOrder> {
    sqlx::query_as::<_, ExportOrder>(
        r#"
        SELECT id, contract_id, warehouse_manager_id, status, created_by, approved_by,
               created_at, updated_at
        FROM export_orders
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("Export order".to_string()))
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<ExportOrder> {
    sqlx::query_as::<_, ExportOrder>(
        r#"
        SELECT id, contract_id, warehouse_manager_id, status, created_by, approved_by,
               created_at, updated_at
        FROM export_orders
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Export order".to_string()))
}

async fn write_status(
    conn: &mut PgConnection,
    order_id: Uuid,
    plan: &TransitionPlan<ExportOrderStatus>,
) -> AppResult<ExportOrder> {
    let (change_approval, approver) = match plan.approval {
        ApprovalChange::Keep => (false, None),
        ApprovalChange::SetApprover(user_id) => (true, Some(user_id)),
        ApprovalChange::Clear => (true, None),
    };

    sqlx::query_as::<_, ExportOrder>(
        r#"
        UPDATE export_orders
        SET status = $1,
            approved_by = CASE WHEN $2 THEN $3 ELSE approved_by END,
            updated_at = NOW()
        WHERE id = $4 AND status = $5
        RETURNING id, contract_id, warehouse_manager_id, status, created_by, approved_by,
                  created_at, updated_at
        "#,
    )
    .bind(plan.to.as_str())
    .bind(change_approval)
    .bind(approver)
    .bind(order_id)
    .bind(plan.from.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| {
        AppError::ConcurrentModification(format!(
            "Export order {} is no longer '{}'",
            order_id, plan.from
        ))
    })
}

async fn contract_prices(conn: &mut PgConnection, contract_id: Uuid) -> AppResult<HashMap<Uuid, Decimal>> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM contracts WHERE id = $1)")
        .bind(contract_id)
        .fetch_one(&mut *conn)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Contract".to_string()));
    }

    let rows: Vec<(Uuid, Decimal)> =
        sqlx::query_as("SELECT medicine_id, unit_price FROM contract_details WHERE contract_id = $1")
            .bind(contract_id)
            .fetch_all(conn)
            .await?;

    Ok(rows.into_iter().collect())
}

/// Expected and picked quantity per line
async fn line_progress(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<ExportLineProgress>> {
    let rows: Vec<(Uuid, Uuid, i32, i64)> = sqlx::query_as(
        r#"
        SELECT d.id, d.medicine_id, d.expected_quantity,
               COALESCE(SUM(k.quantity), 0)::BIGINT AS picked
        FROM export_order_details d
        LEFT JOIN export_order_picks k ON k.export_order_detail_id = d.id
        WHERE d.export_order_id = $1
        GROUP BY d.id, d.line_no, d.medicine_id, d.expected_quantity
        ORDER BY d.line_no
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(detail_id, medicine_id, expected_quantity, picked)| ExportLineProgress {
            detail_id,
            medicine_id,
            expected_quantity,
            picked,
        })
        .collect())
}

type StockRow = (Uuid, Uuid, String, Uuid, i32, NaiveDate, Option<Uuid>);

fn stock_from_row(row: StockRow) -> StockPackage {
    let (package_id, batch_id, batch_code, medicine_id, on_hand, expiry_date, location_id) = row;
    StockPackage {
        package_id,
        batch_id,
        batch_code,
        medicine_id,
        on_hand,
        expiry_date,
        location_id,
    }
}

async fn stock_for_medicines(conn: &mut PgConnection, medicine_ids: &[Uuid]) -> AppResult<Vec<StockPackage>> {
    let rows: Vec<StockRow> = sqlx::query_as(
        r#"
        SELECT p.id, p.batch_id, b.batch_code, b.medicine_id, p.quantity, b.expiry_date, p.location_id
        FROM packages p
        JOIN batches b ON b.id = p.batch_id
        JOIN import_orders o ON o.id = p.import_order_id
        WHERE b.medicine_id = ANY($1)
          AND p.quantity > 0
          AND p.location_id IS NOT NULL
          AND o.status = $2
        "#,
    )
    .bind(medicine_ids)
    .bind(ImportOrderStatus::Completed.as_str())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(stock_from_row).collect())
}

async fn lock_stock_package(conn: &mut PgConnection, package_id: Uuid) -> AppResult<StockPackage> {
    let row: Option<(Uuid, Uuid, String, Uuid, i32, NaiveDate, Option<Uuid>, ImportOrderStatus)> =
        sqlx::query_as(
            r#"
            SELECT p.id, p.batch_id, b.batch_code, b.medicine_id, p.quantity, b.expiry_date,
                   p.location_id, o.status
            FROM packages p
            JOIN batches b ON b.id = p.batch_id
            JOIN import_orders o ON o.id = p.import_order_id
            WHERE p.id = $1
            FOR UPDATE OF p
            "#,
        )
        .bind(package_id)
        .fetch_optional(conn)
        .await?;

    let (id, batch_id, batch_code, medicine_id, on_hand, expiry_date, location_id, receipt_status) =
        row.ok_or_else(|| AppError::NotFound("Package".to_string()))?;

    if receipt_status != ImportOrderStatus::Completed {
        return Err(AppError::InvalidState(format!(
            "Package {} belongs to an import order that is not completed (status: '{}')",
            id, receipt_status
        )));
    }

    Ok(stock_from_row((
        id,
        batch_id,
        batch_code,
        medicine_id,
        on_hand,
        expiry_date,
        location_id,
    )))
}
