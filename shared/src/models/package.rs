//! Physical package and shelf location models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical container holding part of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Package {
    pub id: Uuid,
    pub import_order_id: Uuid,
    pub batch_id: Uuid,
    /// Units currently on hand
    pub quantity: i32,
    /// `None` means the package is still unarranged
    pub location_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn is_arranged(&self) -> bool {
        self.location_id.is_some()
    }
}

/// A shelf slot inside a storage area
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: Uuid,
    pub area_id: Uuid,
    pub bay: String,
    pub shelf_row: i32,
    pub shelf_column: i32,
    pub available: bool,
}
