//! Manufactured lot (batch) models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A manufactured lot of one medicine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batch {
    pub id: Uuid,
    pub medicine_id: Uuid,
    /// Globally unique lot code
    pub batch_code: String,
    pub production_date: NaiveDate,
    pub expiry_date: NaiveDate,
    /// Absent for lots received on internal orders
    pub supplier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
