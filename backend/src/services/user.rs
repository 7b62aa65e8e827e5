//! User lookups needed by the order workflow

use shared::{User, UserRole, UserStatus};
use sqlx::PgPool;

use crate::error::AppResult;

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Active warehouse managers, the only users an order can be assigned to
    pub async fn list_warehouse_managers(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, status, created_at
            FROM users
            WHERE role = $1 AND status = $2
            ORDER BY name
            "#,
        )
        .bind(UserRole::WarehouseManager.as_str())
        .bind(UserStatus::Active.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }
}
