use crate::models::users;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{map_unique_violation, UserStore};

const USER_COLUMNS: &str = "id, name, phone_number, password_hash, referral_code, \
    referred_by_code, role, verified, blocked, created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    async fn fetch_one_by(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, users::User>(&query)
            .bind(value)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn create(&self, user: users::NewUser) -> Result<users::User, anyhow::Error> {
        let user_id = Uuid::new_v4().hyphenated().to_string();

        let query = format!(
            r#"
                INSERT INTO users
                (id, name, phone_number, password_hash, referral_code, referred_by_code, role, verified)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, users::User>(&query)
            .bind(user_id)
            .bind(user.name)
            .bind(user.phone_number)
            .bind(user.password_hash)
            .bind(user.referral_code)
            .bind(user.referred_by_code)
            .bind(user.role)
            .bind(user.verified)
            .fetch_one(&self.conn)
            .await
            .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<users::User>, anyhow::Error> {
        self.fetch_one_by("id", id).await
    }

    async fn find_by_phone_number(
        &self,
        phone_number: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        self.fetch_one_by("phone_number", phone_number).await
    }

    async fn find_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        self.fetch_one_by("referral_code", code).await
    }

    async fn list_referred_by(&self, code: &str) -> Result<Vec<users::User>, anyhow::Error> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE referred_by_code = $1 ORDER BY seq");
        let referred = sqlx::query_as::<_, users::User>(&query)
            .bind(code)
            .fetch_all(&self.conn)
            .await?;

        Ok(referred)
    }

    async fn set_blocked(
        &self,
        id: &str,
        blocked: bool,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let query = format!(
            "UPDATE users SET blocked = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, users::User>(&query)
            .bind(blocked)
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn set_verified(
        &self,
        id: &str,
        verified: bool,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let query = format!(
            "UPDATE users SET verified = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, users::User>(&query)
            .bind(verified)
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }
}
