//! Batch (lot) registration and lookup

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{
    ensure_stock_handler, validate_batch_code, validate_batch_entry_policy, Batch, UserContext,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult};

/// Batch service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Input for declaring a batch
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchInput {
    pub medicine_id: Uuid,
    #[validate(length(min = 1, max = 64, message = "Batch code must be 1-64 characters"))]
    pub batch_code: String,
    pub production_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub supplier_id: Option<Uuid>,
}

/// Filters for listing batches
#[derive(Debug, Default, Deserialize)]
pub struct BatchFilter {
    pub medicine_id: Option<Uuid>,
}

impl BatchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Declare a new batch
    ///
    /// The code pre-check gives a fast answer; a concurrent insert of the same
    /// code is caught by the unique index and reported the same way.
    pub async fn create_batch(&self, ctx: &UserContext, input: CreateBatchInput) -> AppResult<Batch> {
        ensure_stock_handler(ctx, "declare batches")?;
        input.validate()?;
        validate_batch_code(&input.batch_code)?;
        validate_batch_entry_policy(
            input.production_date,
            input.expiry_date,
            Utc::now().date_naive(),
        )?;

        let code = input.batch_code.trim();

        let medicine_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM medicines WHERE id = $1)")
                .bind(input.medicine_id)
                .fetch_one(&self.db)
                .await?;
        if !medicine_exists {
            return Err(AppError::NotFound("Medicine".to_string()));
        }

        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM batches WHERE batch_code = $1)")
                .bind(code)
                .fetch_one(&self.db)
                .await?;
        if taken {
            return Err(AppError::DuplicateEntry("batch_code".to_string()));
        }

        let batch = sqlx::query_as::<_, Batch>(
            r#"
            INSERT INTO batches (medicine_id, batch_code, production_date, expiry_date, supplier_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, medicine_id, batch_code, production_date, expiry_date, supplier_id, created_at
            "#,
        )
        .bind(input.medicine_id)
        .bind(code)
        .bind(input.production_date)
        .bind(input.expiry_date)
        .bind(input.supplier_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "batch_code"))?;

        tracing::info!(batch_id = %batch.id, batch_code = %batch.batch_code, "Batch created");

        Ok(batch)
    }

    /// List batches, earliest expiry first
    pub async fn list_batches(&self, filter: BatchFilter) -> AppResult<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT id, medicine_id, batch_code, production_date, expiry_date, supplier_id, created_at
            FROM batches
            WHERE ($1::UUID IS NULL OR medicine_id = $1)
            ORDER BY expiry_date ASC, batch_code ASC
            "#,
        )
        .bind(filter.medicine_id)
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }
}
