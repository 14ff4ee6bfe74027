//! User Directory Implementation
//!
//! Read-only queries against the portal's `users` table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{UserContact, UserDirectory, UserRole};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

impl From<ContactRow> for UserContact {
    fn from(row: ContactRow) -> Self {
        UserContact {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email.unwrap_or_default(),
            role: row.role.as_deref().map(UserRole::from_db).unwrap_or_default(),
        }
    }
}

/// PostgreSQL user directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_contact(&self, user_id: i64) -> Result<Option<UserContact>, AppError> {
        let row = sqlx::query_as::<_, ContactRow>(
            r#"
            SELECT id, first_name, last_name, email, role
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn admin_ids(&self) -> Result<Vec<i64>, AppError> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE LOWER(role) IN ('admin', 'super_admin', 'superadmin')
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
