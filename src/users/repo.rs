use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Emails are stored lowercase.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub settings: serde_json::Value,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const USER_COLUMNS: &str =
    "id, email, name, avatar_url, email_verified, settings, last_login_at, created_at, updated_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        email: &str,
        name: &str,
        email_verified: bool,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, email_verified)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(name)
        .bind(email_verified)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn mark_email_verified(db: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE email = $1")
            .bind(email)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn touch_last_login(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Partial profile update; absent fields keep their current value.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                avatar_url = COALESCE($3, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(avatar_url)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_settings(
        db: &PgPool,
        id: Uuid,
        settings: &serde_json::Value,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET settings = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(settings)
            .execute(db)
            .await?;
        Ok(())
    }
}
