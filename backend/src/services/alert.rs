//! Alert computations: expiring lots, low stock and bills falling due

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{expiry_state, is_bill_due, is_low_stock, ExpiryState};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AlertConfig;
use crate::error::AppResult;

/// Alert service
#[derive(Clone)]
pub struct AlertService {
    db: PgPool,
    config: AlertConfig,
}

/// Stock held in a lot that expires soon or already has
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpiringStock {
    pub package_id: Uuid,
    pub batch_id: Uuid,
    pub batch_code: String,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub quantity: i32,
    pub expiry_date: NaiveDate,
    pub location_id: Option<Uuid>,
    #[sqlx(skip)]
    pub expired: bool,
}

/// Medicine whose on-hand stock fell below its minimum
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStock {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub on_hand: i64,
    pub minimum_stock: i32,
}

/// Unpaid bill due within the window, overdue ones included
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BillDue {
    pub bill_id: Uuid,
    pub import_order_id: Uuid,
    pub contract_id: Uuid,
    pub total_amount: Decimal,
    pub due_date: NaiveDate,
    #[sqlx(skip)]
    pub overdue: bool,
}

impl AlertService {
    pub fn new(db: PgPool, config: AlertConfig) -> Self {
        Self { db, config }
    }

    /// Packages with stock whose lot expires within the warning window
    pub async fn expiring_stock(&self) -> AppResult<Vec<ExpiringStock>> {
        let today = Utc::now().date_naive();

        let rows = sqlx::query_as::<_, ExpiringStock>(
            r#"
            SELECT p.id AS package_id, p.batch_id, b.batch_code, b.medicine_id,
                   m.name AS medicine_name, p.quantity, b.expiry_date, p.location_id
            FROM packages p
            JOIN batches b ON b.id = p.batch_id
            JOIN medicines m ON m.id = b.medicine_id
            WHERE p.quantity > 0
            ORDER BY b.expiry_date, b.batch_code
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                match expiry_state(row.expiry_date, today, self.config.expiry_warning_days) {
                    ExpiryState::Ok => None,
                    state => {
                        row.expired = state == ExpiryState::Expired;
                        Some(row)
                    }
                }
            })
            .collect())
    }

    /// Medicines whose total on-hand quantity is below `minimum_stock`
    pub async fn low_stock(&self) -> AppResult<Vec<LowStock>> {
        let rows = sqlx::query_as::<_, LowStock>(
            r#"
            SELECT m.id AS medicine_id, m.name AS medicine_name,
                   COALESCE(SUM(p.quantity), 0)::BIGINT AS on_hand, m.minimum_stock
            FROM medicines m
            LEFT JOIN batches b ON b.medicine_id = m.id
            LEFT JOIN packages p ON p.batch_id = b.id
            GROUP BY m.id, m.name, m.minimum_stock
            ORDER BY m.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|row| is_low_stock(row.on_hand, row.minimum_stock))
            .collect())
    }

    /// Unpaid bills due within the configured window
    pub async fn bills_due(&self) -> AppResult<Vec<BillDue>> {
        let today = Utc::now().date_naive();

        let rows = sqlx::query_as::<_, BillDue>(
            r#"
            SELECT id AS bill_id, import_order_id, contract_id, total_amount, due_date
            FROM bills
            WHERE status = 'unpaid'
            ORDER BY due_date
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|row| is_bill_due(row.due_date, today, self.config.bill_due_days))
            .map(|mut row| {
                row.overdue = row.due_date < today;
                row
            })
            .collect())
    }
}
