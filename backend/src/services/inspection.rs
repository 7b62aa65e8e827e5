//! Inspection recorder: receiving quantities per medicine line

use std::collections::BTreeSet;

use serde::Deserialize;
use shared::{
    validate_inspection_quantities, validate_inspection_submission, ImportOrder,
    ImportOrderStatus, Inspection, InspectionEntry, UserContext,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::import_order::{ensure_visible, fetch_inspections, fetch_order};

/// Inspection service
#[derive(Clone)]
pub struct InspectionService {
    db: PgPool,
}

/// Body of a batch submission: `{ "inspections": [...] }` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InspectionSubmission {
    Wrapped { inspections: Vec<InspectionEntry> },
    Bare(Vec<InspectionEntry>),
}

impl InspectionSubmission {
    pub fn into_entries(self) -> Vec<InspectionEntry> {
        match self {
            InspectionSubmission::Wrapped { inspections } => inspections,
            InspectionSubmission::Bare(entries) => entries,
        }
    }
}

/// Partial update of an inspection
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateInspectionInput {
    #[validate(range(min = 0, message = "Actual quantity cannot be negative"))]
    pub actual_quantity: Option<i32>,
    #[validate(range(min = 0, message = "Rejected quantity cannot be negative"))]
    pub rejected_quantity: Option<i32>,
}

impl InspectionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a batch of inspections, possibly across several orders
    ///
    /// Every entry is validated before any row is written, and all rows are
    /// inserted in one transaction.
    pub async fn create_inspections(
        &self,
        ctx: &UserContext,
        entries: Vec<InspectionEntry>,
    ) -> AppResult<Vec<Inspection>> {
        validate_inspection_submission(&entries)?;

        let mut tx = self.db.begin().await?;

        let order_ids: BTreeSet<Uuid> = entries.iter().map(|e| e.import_order_id).collect();
        for order_id in &order_ids {
            let order = lock_order_for_inspection(&mut tx, *order_id).await?;
            ensure_visible(ctx, &order)?;
            ensure_recording_open(&order)?;
        }

        let mut created = Vec::with_capacity(entries.len());
        for entry in &entries {
            created.push(insert_inspection(&mut tx, ctx, entry).await?);
        }

        tx.commit().await?;

        tracing::info!(
            orders = order_ids.len(),
            inspections = created.len(),
            "Inspections recorded"
        );

        Ok(created)
    }

    /// Record one inspection
    ///
    /// History is not checked for duplicates, so a medicine can be re-entered
    /// after its earlier inspection was deleted.
    pub async fn create_single(&self, ctx: &UserContext, entry: InspectionEntry) -> AppResult<Inspection> {
        entry.validate()?;
        validate_inspection_quantities(entry.actual_quantity, entry.rejected_quantity)?;

        let mut tx = self.db.begin().await?;

        let order = lock_order_for_inspection(&mut tx, entry.import_order_id).await?;
        ensure_visible(ctx, &order)?;
        ensure_recording_open(&order)?;

        let inspection = insert_inspection(&mut tx, ctx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            inspection_id = %inspection.id,
            order_id = %inspection.import_order_id,
            "Inspection recorded"
        );

        Ok(inspection)
    }

    /// Update the quantities of an inspection
    ///
    /// The check runs on the effective values: the patch where supplied,
    /// otherwise what is stored.
    pub async fn update_inspection(
        &self,
        ctx: &UserContext,
        inspection_id: Uuid,
        input: UpdateInspectionInput,
    ) -> AppResult<Inspection> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let existing = fetch_inspection(&mut tx, inspection_id).await?;
        let order = lock_order_for_inspection(&mut tx, existing.import_order_id).await?;
        ensure_visible(ctx, &order)?;
        ensure_recording_open(&order)?;

        let actual = input.actual_quantity.unwrap_or(existing.actual_quantity);
        let rejected = input.rejected_quantity.unwrap_or(existing.rejected_quantity);
        validate_inspection_quantities(actual, rejected)?;

        let inspection = sqlx::query_as::<_, Inspection>(
            r#"
            UPDATE inspections
            SET actual_quantity = $1, rejected_quantity = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING id, import_order_id, medicine_id, batch_id, actual_quantity,
                      rejected_quantity, created_by, created_at, updated_at
            "#,
        )
        .bind(actual)
        .bind(rejected)
        .bind(inspection_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(inspection_id = %inspection_id, actual, rejected, "Inspection updated");

        Ok(inspection)
    }

    /// Delete an inspection; the order stays in its current stage
    pub async fn delete_inspection(&self, ctx: &UserContext, inspection_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let existing = fetch_inspection(&mut tx, inspection_id).await?;
        let order = lock_order_for_inspection(&mut tx, existing.import_order_id).await?;
        ensure_visible(ctx, &order)?;

        if !matches!(
            order.status,
            ImportOrderStatus::Delivered | ImportOrderStatus::Checked
        ) {
            return Err(AppError::InvalidState(format!(
                "Inspections can only be deleted while the order is delivered or checked (current status: '{}')",
                order.status
            )));
        }

        sqlx::query("DELETE FROM inspections WHERE id = $1")
            .bind(inspection_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(inspection_id = %inspection_id, order_id = %order.id, "Inspection deleted");

        Ok(())
    }

    /// Inspections of an order; empty for a freshly delivered order
    pub async fn list_by_order(&self, ctx: &UserContext, order_id: Uuid) -> AppResult<Vec<Inspection>> {
        let order = fetch_order(&self.db, order_id).await?;
        ensure_visible(ctx, &order)?;

        fetch_inspections(&self.db, order_id).await
    }
}

/// Inspections are recorded only while the goods sit in receiving
fn ensure_recording_open(order: &ImportOrder) -> AppResult<()> {
    if order.status != ImportOrderStatus::Delivered {
        return Err(AppError::InvalidState(format!(
            "Inspections can only be recorded while the order is delivered (current status: '{}')",
            order.status
        )));
    }
    Ok(())
}

/// Shared row lock: inspections may be written concurrently, but the order
/// cannot move or be packaged meanwhile
async fn lock_order_for_inspection(conn: &mut PgConnection, order_id: Uuid) -> AppResult<ImportOrder> {
    sqlx::query_as::<_, ImportOrder>(
        r#"
        SELECT id, contract_id, warehouse_manager_id, status, created_by, approved_by,
               created_at, updated_at
        FROM import_orders
        WHERE id = $1
        FOR SHARE
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Import order {}", order_id)))
}

async fn fetch_inspection(conn: &mut PgConnection, inspection_id: Uuid) -> AppResult<Inspection> {
    sqlx::query_as::<_, Inspection>(
        r#"
        SELECT id, import_order_id, medicine_id, batch_id, actual_quantity, rejected_quantity,
               created_by, created_at, updated_at
        FROM inspections
        WHERE id = $1
        "#,
    )
    .bind(inspection_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Inspection".to_string()))
}

async fn insert_inspection(
    conn: &mut PgConnection,
    ctx: &UserContext,
    entry: &InspectionEntry,
) -> AppResult<Inspection> {
    let inspection = sqlx::query_as::<_, Inspection>(
        r#"
        INSERT INTO inspections (import_order_id, medicine_id, actual_quantity, rejected_quantity, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, import_order_id, medicine_id, batch_id, actual_quantity, rejected_quantity,
                  created_by, created_at, updated_at
        "#,
    )
    .bind(entry.import_order_id)
    .bind(entry.medicine_id)
    .bind(entry.actual_quantity)
    .bind(entry.rejected_quantity)
    .bind(ctx.user_id)
    .fetch_one(conn)
    .await?;

    Ok(inspection)
}
