//! User, role and request context models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Roles known to the warehouse system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Supervisor,
    Representative,
    RepresentativeManager,
    WarehouseManager,
    WarehouseStaff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::Supervisor => "supervisor",
            UserRole::Representative => "representative",
            UserRole::RepresentativeManager => "representative_manager",
            UserRole::WarehouseManager => "warehouse_manager",
            UserRole::WarehouseStaff => "warehouse_staff",
        }
    }

    /// Supervisors may bypass the transition table and override package quantities
    pub fn is_supervisor(&self) -> bool {
        matches!(self, UserRole::SuperAdmin | UserRole::Supervisor)
    }

    /// Contract-side roles, which never see internal orders
    pub fn is_representative(&self) -> bool {
        matches!(
            self,
            UserRole::Representative | UserRole::RepresentativeManager
        )
    }

    pub fn is_warehouse(&self) -> bool {
        matches!(self, UserRole::WarehouseManager | UserRole::WarehouseStaff)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(UserRole::SuperAdmin),
            "supervisor" => Ok(UserRole::Supervisor),
            "representative" => Ok(UserRole::Representative),
            "representative_manager" => Ok(UserRole::RepresentativeManager),
            "warehouse_manager" => Ok(UserRole::WarehouseManager),
            "warehouse_staff" => Ok(UserRole::WarehouseStaff),
            other => Err(format!("Unknown user role: {}", other)),
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

/// Identity of the caller, passed explicitly into every service operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl UserContext {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }
}
