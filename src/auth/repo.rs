use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    error::StoreResult,
};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, role, \
                            is_active, created_at, updated_at";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(user.role)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }
}

/// Loads users for hydrating joined records. Soft-deleted rows are included.
pub(crate) async fn users_by_ids(db: &PgPool, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
    let rows = sqlx::query_as::<_, User>(&sql)
        .bind(ids)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(|u| (u.id, u)).collect())
}
