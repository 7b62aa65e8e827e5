//! Import (inbound) and export (outbound) order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the warehouse an order belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Import,
    Export,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Import => write!(f, "import"),
            OrderKind::Export => write!(f, "export"),
        }
    }
}

/// Status of an import order. Legal movements live in [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ImportOrderStatus {
    Draft,
    Approved,
    Delivered,
    Checked,
    Arranged,
    Completed,
    Cancelled,
    Rejected,
}

impl ImportOrderStatus {
    pub const ALL: [ImportOrderStatus; 8] = [
        ImportOrderStatus::Draft,
        ImportOrderStatus::Approved,
        ImportOrderStatus::Delivered,
        ImportOrderStatus::Checked,
        ImportOrderStatus::Arranged,
        ImportOrderStatus::Completed,
        ImportOrderStatus::Cancelled,
        ImportOrderStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportOrderStatus::Draft => "draft",
            ImportOrderStatus::Approved => "approved",
            ImportOrderStatus::Delivered => "delivered",
            ImportOrderStatus::Checked => "checked",
            ImportOrderStatus::Arranged => "arranged",
            ImportOrderStatus::Completed => "completed",
            ImportOrderStatus::Cancelled => "cancelled",
            ImportOrderStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ImportOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImportOrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown import order status: {}", s))
    }
}

/// Status of an export order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ExportOrderStatus {
    Draft,
    Approved,
    Rejected,
    Completed,
    Returned,
    Cancelled,
}

impl ExportOrderStatus {
    pub const ALL: [ExportOrderStatus; 6] = [
        ExportOrderStatus::Draft,
        ExportOrderStatus::Approved,
        ExportOrderStatus::Rejected,
        ExportOrderStatus::Completed,
        ExportOrderStatus::Returned,
        ExportOrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportOrderStatus::Draft => "draft",
            ExportOrderStatus::Approved => "approved",
            ExportOrderStatus::Rejected => "rejected",
            ExportOrderStatus::Completed => "completed",
            ExportOrderStatus::Returned => "returned",
            ExportOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExportOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportOrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown export order status: {}", s))
    }
}

/// An inbound shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ImportOrder {
    pub id: Uuid,
    /// Absent for internal orders raised directly by a warehouse manager
    pub contract_id: Option<Uuid>,
    pub warehouse_manager_id: Option<Uuid>,
    pub status: ImportOrderStatus,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportOrder {
    pub fn is_internal(&self) -> bool {
        self.contract_id.is_none()
    }
}

/// A line of an import order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ImportOrderDetail {
    pub id: Uuid,
    pub import_order_id: Uuid,
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// An outbound shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExportOrder {
    pub id: Uuid,
    pub contract_id: Option<Uuid>,
    pub warehouse_manager_id: Option<Uuid>,
    pub status: ExportOrderStatus,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExportOrder {
    pub fn is_internal(&self) -> bool {
        self.contract_id.is_none()
    }
}

/// A line of an export order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExportOrderDetail {
    pub id: Uuid,
    pub export_order_id: Uuid,
    pub medicine_id: Uuid,
    pub expected_quantity: i32,
    pub unit_price: Decimal,
}

/// Quantity taken from one package to satisfy an export line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ActualItem {
    pub id: Uuid,
    pub export_order_detail_id: Uuid,
    pub package_id: Uuid,
    pub quantity: i32,
    pub picked_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A requested order line as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}
