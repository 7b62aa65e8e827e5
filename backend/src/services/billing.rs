//! Billing records raised when a contract-backed import order completes

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{bill_due_date, ImportOrder};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;

/// A bill owed on a completed contract order
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub import_order_id: Uuid,
    pub contract_id: Uuid,
    pub total_amount: Decimal,
    pub issued_on: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Create the bill for `order`, mirroring its lines
///
/// Runs on the caller's transaction so the bill exists exactly when the
/// order reaches `completed`.
pub(crate) async fn create_bill_for_order(
    conn: &mut PgConnection,
    order: &ImportOrder,
    contract_id: Uuid,
    issued_on: NaiveDate,
    payment_term_days: u32,
) -> AppResult<Bill> {
    let due_date = bill_due_date(issued_on, payment_term_days);

    let bill = sqlx::query_as::<_, Bill>(
        r#"
        INSERT INTO bills (import_order_id, contract_id, total_amount, issued_on, due_date)
        SELECT $1, $2, COALESCE(SUM(quantity * unit_price), 0), $3, $4
        FROM import_order_details
        WHERE import_order_id = $1
        RETURNING id, import_order_id, contract_id, total_amount, issued_on, due_date,
                  status, created_at
        "#,
    )
    .bind(order.id)
    .bind(contract_id)
    .bind(issued_on)
    .bind(due_date)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO bill_details (bill_id, medicine_id, quantity, unit_price)
        SELECT $1, medicine_id, quantity, unit_price
        FROM import_order_details
        WHERE import_order_id = $2
        "#,
    )
    .bind(bill.id)
    .bind(order.id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        bill_id = %bill.id,
        order_id = %order.id,
        total = %bill.total_amount,
        due = %bill.due_date,
        "Bill created for completed import order"
    );

    Ok(bill)
}
