//! Receiving inspection models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Actual and rejected quantity recorded for one medicine on one import order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Inspection {
    pub id: Uuid,
    pub import_order_id: Uuid,
    pub medicine_id: Uuid,
    /// Filled in once the packaging step settles the lot
    pub batch_id: Option<Uuid>,
    pub actual_quantity: i32,
    pub rejected_quantity: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inspection {
    /// Quantity accepted into stock
    pub fn net_quantity(&self) -> i32 {
        self.actual_quantity - self.rejected_quantity
    }
}

/// One entry of an inspection submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct InspectionEntry {
    pub import_order_id: Uuid,
    pub medicine_id: Uuid,
    #[validate(range(min = 0, message = "Actual quantity cannot be negative"))]
    pub actual_quantity: i32,
    #[validate(range(min = 0, message = "Rejected quantity cannot be negative"))]
    pub rejected_quantity: i32,
}
