//! Packaging step: turn inspection results into batches and packages and move
//! the order from `checked` to `arranged`, all in one transaction

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    authorize_import_transition, find_duplicates, reconcile, validate_batch_code,
    validate_batch_entry_policy, Batch, DomainError, ImportOrder, ImportOrderStatus,
    InspectedQuantity, Package, ProposedPackage, UserContext,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{map_unique_violation, AppError, AppResult};
use crate::services::import_order::{
    ensure_visible, fetch_inspections, lock_order, medicine_names, persisted_packages,
    write_status,
};

/// Packaging service
#[derive(Clone)]
pub struct PackagingService {
    db: PgPool,
}

/// A lot declared during packaging, referenced by rows through `key`
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatchInput {
    /// Client-side reference, unique within the submission
    pub key: String,
    pub medicine_id: Uuid,
    pub batch_code: String,
    pub production_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub supplier_id: Option<Uuid>,
}

/// One proposed package row
#[derive(Debug, Clone, Deserialize)]
pub struct PackageRowInput {
    /// An existing batch
    pub batch_id: Option<Uuid>,
    /// A batch declared in the same submission
    pub batch_key: Option<String>,
    pub quantity: i64,
}

/// Input for the packaging step
#[derive(Debug, Deserialize)]
pub struct PackagingInput {
    #[serde(default)]
    pub new_batches: Vec<NewBatchInput>,
    pub packages: Vec<PackageRowInput>,
}

/// Everything the packaging step wrote
#[derive(Debug, Serialize)]
pub struct PackagingResult {
    pub order: ImportOrder,
    pub batches: Vec<Batch>,
    pub packages: Vec<Package>,
}

/// Where a row's batch comes from once resolved
#[derive(Debug, Clone, Copy)]
enum BatchRef<'a> {
    Existing(Uuid),
    Declared(&'a str),
}

impl PackagingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Run the packaging step for an import order
    ///
    /// The order row is locked and inspections are re-read inside the
    /// transaction, so concurrent inspection edits cannot slip past the
    /// reconciliation. Nothing is written unless the packages match.
    pub async fn package_order(
        &self,
        ctx: &UserContext,
        order_id: Uuid,
        input: PackagingInput,
    ) -> AppResult<PackagingResult> {
        let today = Utc::now().date_naive();
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        ensure_visible(ctx, &order)?;
        let plan = authorize_import_transition(order.status, ImportOrderStatus::Arranged, ctx, false)?;

        let declared = validate_declared_batches(&input.new_batches, today)?;
        ensure_codes_unused(&mut tx, &input.new_batches).await?;

        // Resolve every row to its batch and medicine
        let existing_ids: Vec<Uuid> = input.packages.iter().filter_map(|row| row.batch_id).collect();
        let existing_medicines = batch_medicines(&mut tx, &existing_ids).await?;

        let mut refs: Vec<Option<BatchRef<'_>>> = Vec::with_capacity(input.packages.len());
        let mut proposed: Vec<ProposedPackage> = Vec::with_capacity(input.packages.len());
        for row in &input.packages {
            let (batch_ref, medicine_id) = match (&row.batch_key, row.batch_id) {
                (Some(key), _) => {
                    let batch = declared.get(key.as_str()).ok_or_else(|| {
                        DomainError::validation(
                            "batch_key",
                            format!("Package row references unknown new batch '{}'", key),
                        )
                    })?;
                    (Some(BatchRef::Declared(key.as_str())), Some(batch.medicine_id))
                }
                (None, Some(batch_id)) => {
                    let medicine_id = existing_medicines
                        .get(&batch_id)
                        .copied()
                        .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;
                    (Some(BatchRef::Existing(batch_id)), Some(medicine_id))
                }
                (None, None) => (None, None),
            };
            refs.push(batch_ref);
            proposed.push(ProposedPackage {
                medicine_id,
                quantity: row.quantity,
            });
        }

        // Reconcile proposed rows plus anything already packaged for the order
        let inspections = fetch_inspections(&mut *tx, order_id).await?;
        if inspections.is_empty() {
            return Err(AppError::InvalidState(
                "Import order has no inspections to package".to_string(),
            ));
        }
        let inspected: Vec<InspectedQuantity> =
            inspections.iter().map(InspectedQuantity::from).collect();

        let mut all_packages = proposed.clone();
        all_packages.extend(persisted_packages(&mut *tx, order_id).await?);

        let mut medicine_ids: Vec<Uuid> = inspected.iter().map(|i| i.medicine_id).collect();
        medicine_ids.extend(all_packages.iter().filter_map(|p| p.medicine_id));
        let names = medicine_names(&mut *tx, &medicine_ids).await?;

        let report = reconcile(&inspected, &all_packages, &names);
        if !report.valid {
            tracing::info!(
                order_id = %order_id,
                diagnostics = report.diagnostics.len(),
                "Packaging rejected by reconciliation"
            );
        }
        report.into_result()?;

        // Persist new batches, then packages, then move the order
        let mut batches = Vec::with_capacity(input.new_batches.len());
        let mut declared_ids: HashMap<&str, Uuid> = HashMap::new();
        for batch in &input.new_batches {
            let created = insert_batch(&mut tx, batch).await?;
            declared_ids.insert(batch.key.as_str(), created.id);
            batches.push(created);
        }

        let mut packages = Vec::with_capacity(input.packages.len());
        let mut batches_by_medicine: BTreeMap<Uuid, BTreeSet<Uuid>> = BTreeMap::new();
        for ((batch_ref, row), proposal) in refs.iter().zip(&input.packages).zip(&proposed) {
            let batch_id = match batch_ref {
                Some(BatchRef::Existing(id)) => *id,
                Some(BatchRef::Declared(key)) => *declared_ids
                    .get(key)
                    .ok_or_else(|| AppError::Internal("Declared batch was not created".to_string()))?,
                None => {
                    return Err(AppError::Internal("Unresolved package row".to_string()));
                }
            };
            if let Some(medicine_id) = proposal.medicine_id {
                batches_by_medicine.entry(medicine_id).or_default().insert(batch_id);
            }

            let quantity = i32::try_from(row.quantity).map_err(|_| {
                DomainError::validation("quantity", format!("Quantity {} is too large", row.quantity))
            })?;
            packages.push(insert_package(&mut tx, order_id, batch_id, quantity).await?);
        }

        // A medicine packaged from exactly one lot records that lot on its inspections
        for (medicine_id, batch_ids) in &batches_by_medicine {
            if let (1, Some(batch_id)) = (batch_ids.len(), batch_ids.iter().next()) {
                sqlx::query(
                    r#"
                    UPDATE inspections SET batch_id = $1, updated_at = NOW()
                    WHERE import_order_id = $2 AND medicine_id = $3
                    "#,
                )
                .bind(batch_id)
                .bind(order_id)
                .bind(medicine_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        let order = write_status(&mut tx, order_id, &plan).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            batches = batches.len(),
            packages = packages.len(),
            "Packages materialized, import order arranged"
        );

        Ok(PackagingResult {
            order,
            batches,
            packages,
        })
    }
}

/// Check declared batches and index them by key
fn validate_declared_batches(
    batches: &[NewBatchInput],
    today: NaiveDate,
) -> Result<HashMap<&str, &NewBatchInput>, DomainError> {
    let duplicate_codes = find_duplicates(batches.iter().map(|b| b.batch_code.trim()));
    if let Some(code) = duplicate_codes.first() {
        return Err(DomainError::validation(
            "batch_code",
            format!("Batch code '{}' is declared more than once", code),
        ));
    }

    let mut by_key = HashMap::with_capacity(batches.len());
    for batch in batches {
        validate_batch_code(&batch.batch_code)?;
        validate_batch_entry_policy(batch.production_date, batch.expiry_date, today)?;
        if by_key.insert(batch.key.as_str(), batch).is_some() {
            return Err(DomainError::validation(
                "key",
                format!("Batch key '{}' is used more than once", batch.key),
            ));
        }
    }

    Ok(by_key)
}

/// Fast-fail on codes already stored; the unique index settles races
async fn ensure_codes_unused(conn: &mut PgConnection, batches: &[NewBatchInput]) -> AppResult<()> {
    if batches.is_empty() {
        return Ok(());
    }

    let codes: Vec<String> = batches.iter().map(|b| b.batch_code.trim().to_string()).collect();
    let taken: Vec<String> =
        sqlx::query_scalar("SELECT batch_code FROM batches WHERE batch_code = ANY($1)")
            .bind(&codes)
            .fetch_all(conn)
            .await?;

    if taken.is_empty() {
        Ok(())
    } else {
        Err(AppError::DuplicateEntry(format!("batch_code {}", taken.join(", "))))
    }
}

async fn batch_medicines(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Uuid>> {
    let unique: Vec<Uuid> = ids.iter().copied().collect::<HashSet<_>>().into_iter().collect();
    if unique.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, Uuid)> =
        sqlx::query_as("SELECT id, medicine_id FROM batches WHERE id = ANY($1)")
            .bind(&unique)
            .fetch_all(conn)
            .await?;

    Ok(rows.into_iter().collect())
}

async fn insert_batch(conn: &mut PgConnection, batch: &NewBatchInput) -> AppResult<Batch> {
    sqlx::query_as::<_, Batch>(
        r#"
        INSERT INTO batches (medicine_id, batch_code, production_date, expiry_date, supplier_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, medicine_id, batch_code, production_date, expiry_date, supplier_id, created_at
        "#,
    )
    .bind(batch.medicine_id)
    .bind(batch.batch_code.trim())
    .bind(batch.production_date)
    .bind(batch.expiry_date)
    .bind(batch.supplier_id)
    .fetch_one(conn)
    .await
    .map_err(|e| map_unique_violation(e, "batch_code"))
}

async fn insert_package(
    conn: &mut PgConnection,
    order_id: Uuid,
    batch_id: Uuid,
    quantity: i32,
) -> AppResult<Package> {
    let package = sqlx::query_as::<_, Package>(
        r#"
        INSERT INTO packages (import_order_id, batch_id, quantity)
        VALUES ($1, $2, $3)
        RETURNING id, import_order_id, batch_id, quantity, location_id, created_at, updated_at
        "#,
    )
    .bind(order_id)
    .bind(batch_id)
    .bind(quantity)
    .fetch_one(conn)
    .await?;

    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn declared(key: &str, code: &str) -> NewBatchInput {
        NewBatchInput {
            key: key.to_string(),
            medicine_id: Uuid::new_v4(),
            batch_code: code.to_string(),
            production_date: date(2026, 6, 1),
            expiry_date: date(2028, 6, 1),
            supplier_id: None,
        }
    }

    #[test]
    fn test_declared_batches_indexed_by_key() {
        let batches = vec![declared("a", "LOT-A"), declared("b", "LOT-B")];
        let by_key = validate_declared_batches(&batches, date(2026, 10, 19)).unwrap();
        assert_eq!(by_key.len(), 2);
        assert_eq!(by_key["b"].batch_code, "LOT-B");
    }

    #[test]
    fn test_declared_batches_reject_repeated_code_or_key() {
        let today = date(2026, 10, 19);
        assert!(validate_declared_batches(&[declared("a", "LOT"), declared("b", "LOT")], today).is_err());
        assert!(validate_declared_batches(&[declared("a", "L1"), declared("a", "L2")], today).is_err());
    }

    #[test]
    fn test_declared_batches_apply_entry_policy() {
        let mut short_lived = declared("a", "LOT-A");
        short_lived.expiry_date = date(2027, 1, 1);
        assert!(validate_declared_batches(&[short_lived], date(2026, 10, 19)).is_err());
    }
}
