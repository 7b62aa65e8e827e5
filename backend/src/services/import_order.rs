//! Import order service: the order entity store and the persisted side of the
//! import lifecycle

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    authorize_import_edit, authorize_import_transition, check_manager_assignment,
    ensure_import_deletable, plan_import_creation, reconcile, validate_import_lines,
    ApprovalChange, ImportOrder, ImportOrderDetail, ImportOrderStatus, InspectedQuantity,
    Inspection, OrderLine, PaginatedResponse, Pagination, PaginationMeta, ProposedPackage,
    TransitionPlan, User, UserContext,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::error::{AppError, AppResult};
use crate::services::billing::{self, Bill};

/// Import order service
#[derive(Clone)]
pub struct ImportOrderService {
    db: PgPool,
    billing: BillingConfig,
}

/// Input for creating an import order
#[derive(Debug, Deserialize)]
pub struct CreateImportOrderInput {
    /// Absent for internal orders
    pub contract_id: Option<Uuid>,
    #[serde(alias = "order_details")]
    pub details: Vec<OrderLine>,
}

/// Input for updating an import order
#[derive(Debug, Default, Deserialize)]
pub struct UpdateImportOrderInput {
    /// Replaces every line when present
    pub details: Option<Vec<OrderLine>>,
    pub status: Option<ImportOrderStatus>,
    #[serde(default)]
    pub bypass: bool,
}

/// Input for a status change
#[derive(Debug, Deserialize)]
pub struct TransitionInput {
    pub status: ImportOrderStatus,
    #[serde(default)]
    pub bypass: bool,
}

/// Input for assigning a warehouse manager
#[derive(Debug, Deserialize)]
pub struct AssignManagerInput {
    pub warehouse_manager_id: Uuid,
}

/// Filters for listing import orders
#[derive(Debug, Default, Deserialize)]
pub struct ImportOrderFilter {
    pub status: Option<ImportOrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Import order with its lines
#[derive(Debug, Clone, Serialize)]
pub struct ImportOrderWithDetails {
    #[serde(flatten)]
    pub order: ImportOrder,
    pub details: Vec<ImportOrderDetail>,
}

/// Result of a status change
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResult {
    pub order: ImportOrder,
    pub previous_status: ImportOrderStatus,
    /// Present when the change completed a contract order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill: Option<Bill>,
}

struct ContractLine {
    min_order_quantity: i32,
    unit_price: Decimal,
}

impl ImportOrderService {
    pub fn new(db: PgPool, billing: BillingConfig) -> Self {
        Self { db, billing }
    }

    /// Create an import order with its lines
    ///
    /// Contract orders start in `draft`; internal orders raised by a warehouse
    /// manager start in `delivered` with the manager assigned.
    pub async fn create_order(
        &self,
        ctx: &UserContext,
        input: CreateImportOrderInput,
    ) -> AppResult<ImportOrderWithDetails> {
        let plan = plan_import_creation(ctx, input.contract_id.is_some())?;

        let mut tx = self.db.begin().await?;

        let contract_lines = match input.contract_id {
            Some(contract_id) => Some(load_contract_lines(&mut tx, contract_id).await?),
            None => None,
        };
        validate_import_lines(&input.details, minimums(contract_lines.as_ref()).as_ref())?;

        let order = sqlx::query_as::<_, ImportOrder>(
            r#"
            INSERT INTO import_orders (contract_id, warehouse_manager_id, status, created_by)
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

        let details = insert_details(
            &mut tx,
            order.id,
            &input.details,
            contract_lines.as_ref(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            internal = order.is_internal(),
            lines = details.len(),
            "Import order created"
        );

        Ok(ImportOrderWithDetails { order, details })
    }

    /// Get an import order with its lines
    ///
    /// Representatives never see internal orders; for them those do not exist.
    pub async fn get_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<ImportOrderWithDetails> {
        let order = fetch_order(&self.db, order_id).await?;
        ensure_visible(ctx, &order)?;

        let details = fetch_details(&self.db, order_id).await?;

        Ok(ImportOrderWithDetails { order, details })
    }

    /// List import orders, newest first
    pub async fn list_orders(
        &self,
        ctx: &UserContext,
        filter: ImportOrderFilter,
    ) -> AppResult<PaginatedResponse<ImportOrder>> {
        let pagination = Pagination::new(filter.page, filter.limit);
        let status = filter.status.map(|s| s.as_str());
        let contract_only = ctx.role.is_representative();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM import_orders
            WHERE ($1::VARCHAR IS NULL OR status = $1)
              AND (NOT $2 OR contract_id IS NOT NULL)
            "#,
        )
        .bind(status)
        .bind(contract_only)
        .fetch_one(&self.db)
        .await?;

        let orders = sqlx::query_as::<_, ImportOrder>(
            r#"
            SELECT id, contract_id, warehouse_manager_id, status, created_by, approved_by,
                   created_at, updated_at
            FROM import_orders
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

    /// Update an import order
    ///
    /// Any patch is refused once the order is checked. Lines are replaced as a
    /// whole and re-validated; a status in the patch goes through the guard.
    pub async fn update_order(
        &self,
        ctx: &UserContext,
        order_id: Uuid,
        input: UpdateImportOrderInput,
    ) -> AppResult<ImportOrderWithDetails> {
        let mut tx = self.db.begin().await?;

        let mut order = lock_order(&mut tx, order_id).await?;
        ensure_visible(ctx, &order)?;
        authorize_import_edit(order.status, ctx)?;

        if let Some(lines) = &input.details {
            let contract_lines = match order.contract_id {
                Some(contract_id) => Some(load_contract_lines(&mut tx, contract_id).await?),
                None => None,
            };
            validate_import_lines(lines, minimums(contract_lines.as_ref()).as_ref())?;

            sqlx::query("DELETE FROM import_order_details WHERE import_order_id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
            insert_details(&mut tx, order_id, lines, contract_lines.as_ref()).await?;

            order = touch_order(&mut tx, &order).await?;
        }

        if let Some(requested) = input.status {
            let plan = authorize_import_transition(order.status, requested, ctx, input.bypass)?;
            let (updated, _) = self.apply_transition(&mut tx, &order, plan, ctx).await?;
            order = updated;
        }

        let details = fetch_details(&mut *tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, status = %order.status, "Import order updated");

        Ok(ImportOrderWithDetails { order, details })
    }

    /// Delete an import order (draft or cancelled only)
    pub async fn delete_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        ensure_visible(ctx, &order)?;
        ensure_import_deletable(order.status)?;

        let packages: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM packages WHERE import_order_id = $1")
                .bind(order_id)
                .fetch_one(&mut *tx)
                .await?;
        if packages > 0 {
            return Err(AppError::InvalidState(
                "Import order already has packages and cannot be deleted".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM import_orders WHERE id = $1 AND status = $2")
            .bind(order_id)
            .bind(order.status.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentModification(format!(
                "Import order {} changed while it was being deleted",
                order_id
            )));
        }

        tx.commit().await?;

        tracing::info!(order_id = %order_id, "Import order deleted");

        Ok(())
    }

    /// Change the status of an import order
    ///
    /// The move is checked against the persisted status and written with
    /// compare-and-swap. Stage gates run inside the same transaction.
    pub async fn transition(
        &self,
        ctx: &UserContext,
        order_id: Uuid,
        input: TransitionInput,
    ) -> AppResult<TransitionResult> {
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        ensure_visible(ctx, &order)?;

        let plan = authorize_import_transition(order.status, input.status, ctx, input.bypass)?;
        let (order, bill) = self.apply_transition(&mut tx, &order, plan, ctx).await?;

        tx.commit().await?;

        Ok(TransitionResult {
            order,
            previous_status: plan.from,
            bill,
        })
    }

    /// Finalize an import order: every package located, then `completed`
    pub async fn complete_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<TransitionResult> {
        self.transition(
            ctx,
            order_id,
            TransitionInput {
                status: ImportOrderStatus::Completed,
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
    ) -> AppResult<ImportOrder> {
        let order = fetch_order(&self.db, order_id).await?;
        ensure_visible(ctx, &order)?;

        if order.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Import order is '{}' and can no longer change",
                order.status
            )));
        }

        let candidate = fetch_user(&self.db, input.warehouse_manager_id).await?;
        let manager_id = check_manager_assignment(
            order.warehouse_manager_id,
            input.warehouse_manager_id,
            candidate.as_ref(),
        )?;

        let updated = sqlx::query_as::<_, ImportOrder>(
            r#"
            UPDATE import_orders
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

    /// Run stage gates for the target status and write the change
    pub(crate) async fn apply_transition(
        &self,
        conn: &mut PgConnection,
        order: &ImportOrder,
        plan: TransitionPlan<ImportOrderStatus>,
        ctx: &UserContext,
    ) -> AppResult<(ImportOrder, Option<Bill>)> {
        if plan.bypassed {
            tracing::warn!(
                order_id = %order.id,
                user_id = %ctx.user_id,
                from = %plan.from,
                to = %plan.to,
                "Supervisor bypassed the import transition table"
            );
        }

        match plan.to {
            ImportOrderStatus::Checked => ensure_inspected(conn, order.id).await?,
            ImportOrderStatus::Arranged => ensure_packages_reconciled(conn, order.id).await?,
            ImportOrderStatus::Completed => ensure_all_located(conn, order.id).await?,
            _ => {}
        }

        let updated = write_status(conn, order.id, &plan).await?;

        let bill = match (plan.to, updated.contract_id) {
            (ImportOrderStatus::Completed, Some(contract_id)) => Some(
                billing::create_bill_for_order(
                    conn,
                    &updated,
                    contract_id,
                    Utc::now().date_naive(),
                    self.billing.payment_term_days,
                )
                .await?,
            ),
            _ => None,
        };

        tracing::info!(
            order_id = %order.id,
            from = %plan.from,
            to = %plan.to,
            "Import order status changed"
        );

        Ok((updated, bill))
    }
}

// ============================================================================
// Persistence helpers shared with the packaging and inspection services
// ============================================================================

/// Fetch an import order by id
pub(crate) async fn fetch_order<'e, E>(executor: E, order_id: Uuid) -> AppResult<ImportOrder>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, ImportOrder>(
        r#"
        SELECT id, contract_id, warehouse_manager_id, status, created_by, approved_by,
               created_at, updated_at
        FROM import_orders
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound("Import order".to_string()))
}

/// Fetch an import order and hold its row lock until the transaction ends
pub(crate) async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<ImportOrder> {
    sqlx::query_as::<_, ImportOrder>(
        r#"
        SELECT id, contract_id, warehouse_manager_id, status, created_by, approved_by,
               created_at, updated_at
        FROM import_orders
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Import order".to_string()))
}

pub(crate) fn ensure_visible(ctx: &UserContext, order: &ImportOrder) -> AppResult<()> {
    if ctx.role.is_representative() && order.is_internal() {
        return Err(AppError::NotFound("Import order".to_string()));
    }
    Ok(())
}

/// Compare-and-swap status write against the status the plan was made from
pub(crate) async fn write_status(
    conn: &mut PgConnection,
    order_id: Uuid,
    plan: &TransitionPlan<ImportOrderStatus>,
) -> AppResult<ImportOrder> {
    let (change_approval, approver) = match plan.approval {
        ApprovalChange::Keep => (false, None),
        ApprovalChange::SetApprover(user_id) => (true, Some(user_id)),
        ApprovalChange::Clear => (true, None),
    };

    sqlx::query_as::<_, ImportOrder>(
        r#"
        UPDATE import_orders
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
            "Import order {} is no longer '{}'",
            order_id, plan.from
        ))
    })
}

async fn touch_order(conn: &mut PgConnection, order: &ImportOrder) -> AppResult<ImportOrder> {
    sqlx::query_as::<_, ImportOrder>(
        r#"
        UPDATE import_orders
        SET updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING id, contract_id, warehouse_manager_id, status, created_by, approved_by,
                  created_at, updated_at
        "#,
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| {
        AppError::ConcurrentModification(format!(
            "Import order {} is no longer '{}'",
            order.id, order.status
        ))
    })
}

pub(crate) async fn fetch_details<'e, E>(executor: E, order_id: Uuid) -> AppResult<Vec<ImportOrderDetail>>
where
    E: sqlx::PgExecutor<'e>,
{
    let details = sqlx::query_as::<_, ImportOrderDetail>(
        r#"
        SELECT id, import_order_id, medicine_id, quantity, unit_price
        FROM import_order_details
        WHERE import_order_id = $1
        ORDER BY line_no
        "#,
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(details)
}

pub(crate) async fn fetch_user<'e, E>(executor: E, user_id: Uuid) -> AppResult<Option<User>>
where
    E: sqlx::PgExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, status, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

pub(crate) async fn fetch_inspections<'e, E>(executor: E, order_id: Uuid) -> AppResult<Vec<Inspection>>
where
    E: sqlx::PgExecutor<'e>,
{
    let inspections = sqlx::query_as::<_, Inspection>(
        r#"
        SELECT id, import_order_id, medicine_id, batch_id, actual_quantity, rejected_quantity,
               created_by, created_at, updated_at
        FROM inspections
        WHERE import_order_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(inspections)
}

/// Medicine display names for diagnostics
pub(crate) async fn medicine_names<'e, E>(executor: E, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT id, name FROM medicines WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(executor)
            .await?;

    Ok(rows.into_iter().collect())
}

/// Packages already persisted for the order, resolved to their medicine
pub(crate) async fn persisted_packages<'e, E>(executor: E, order_id: Uuid) -> AppResult<Vec<ProposedPackage>>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows: Vec<(Uuid, i32)> = sqlx::query_as(
        r#"
        SELECT b.medicine_id, p.quantity
        FROM packages p
        JOIN batches b ON b.id = p.batch_id
        WHERE p.import_order_id = $1 AND p.quantity > 0
        "#,
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(medicine_id, quantity)| ProposedPackage {
            medicine_id: Some(medicine_id),
            quantity: i64::from(quantity),
        })
        .collect())
}

// ============================================================================
// Stage gates
// ============================================================================

async fn ensure_inspected(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inspections WHERE import_order_id = $1")
            .bind(order_id)
            .fetch_one(conn)
            .await?;

    if count == 0 {
        return Err(AppError::InvalidState(
            "Record at least one inspection before finishing inspection".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_packages_reconciled(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
    let inspections = fetch_inspections(&mut *conn, order_id).await?;
    let inspected: Vec<InspectedQuantity> = inspections.iter().map(InspectedQuantity::from).collect();
    let packages = persisted_packages(&mut *conn, order_id).await?;

    let mut ids: Vec<Uuid> = inspected.iter().map(|i| i.medicine_id).collect();
    ids.extend(packages.iter().filter_map(|p| p.medicine_id));
    let names = medicine_names(&mut *conn, &ids).await?;

    reconcile(&inspected, &packages, &names).into_result()?;
    Ok(())
}

async fn ensure_all_located(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
    let unarranged: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM packages WHERE import_order_id = $1 AND location_id IS NULL",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;

    if unarranged > 0 {
        return Err(AppError::InvalidState(format!(
            "{} package(s) still have no location",
            unarranged
        )));
    }
    Ok(())
}

// ============================================================================
// Contract lines
// ============================================================================

async fn load_contract_lines(
    conn: &mut PgConnection,
    contract_id: Uuid,
) -> AppResult<HashMap<Uuid, ContractLine>> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM contracts WHERE id = $1)")
        .bind(contract_id)
        .fetch_one(&mut *conn)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Contract".to_string()));
    }

    let rows: Vec<(Uuid, i32, Decimal)> = sqlx::query_as(
        r#"
        SELECT medicine_id, min_order_quantity, unit_price
        FROM contract_details
        WHERE contract_id = $1
        "#,
    )
    .bind(contract_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(medicine_id, min_order_quantity, unit_price)| {
            (
                medicine_id,
                ContractLine {
                    min_order_quantity,
                    unit_price,
                },
            )
        })
        .collect())
}

/// Minimum order quantity per medicine; `None` for internal orders
fn minimums(contract_lines: Option<&HashMap<Uuid, ContractLine>>) -> Option<HashMap<Uuid, i32>> {
    contract_lines.map(|lines| {
        lines
            .iter()
            .map(|(medicine_id, line)| (*medicine_id, line.min_order_quantity))
            .collect()
    })
}

async fn insert_details(
    conn: &mut PgConnection,
    order_id: Uuid,
    lines: &[OrderLine],
    contract_lines: Option<&HashMap<Uuid, ContractLine>>,
) -> AppResult<Vec<ImportOrderDetail>> {
    let mut details = Vec::with_capacity(lines.len());

    for (line_no, line) in (1i32..).zip(lines) {
        let unit_price = line
            .unit_price
            .or_else(|| {
                contract_lines
                    .and_then(|c| c.get(&line.medicine_id))
                    .map(|c| c.unit_price)
            })
            .unwrap_or(Decimal::ZERO);

        let detail = sqlx::query_as::<_, ImportOrderDetail>(
            r#"
            INSERT INTO import_order_details (import_order_id, line_no, medicine_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, import_order_id, medicine_id, quantity, unit_price
            "#,
        )
        .bind(order_id)
        .bind(line_no)
        .bind(line.medicine_id)
        .bind(line.quantity)
        .bind(unit_price)
        .fetch_one(&mut *conn)
        .await?;

        details.push(detail);
    }

    Ok(details)
}
