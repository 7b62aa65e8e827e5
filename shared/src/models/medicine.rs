//! Medicine catalogue entries referenced by orders, inspections and batches

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Medicine {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    /// Stock level below which a low-stock alert is raised
    pub minimum_stock: i32,
}
