use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. API responses carry the full row, hashed
/// password included, which existing clients rely on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub remember_token: Option<String>,
    pub email_verified_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, remember_token, email_verified_at,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by id.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, remember_token, email_verified_at,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password, remember_token, email_verified_at,
                      created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Overwrite name and email on the row with the given id.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, email = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, name, email, password, remember_token, email_verified_at,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Store a freshly generated verification token on the user.
    pub async fn set_remember_token(db: &PgPool, id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET remember_token = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Find the user holding an unconsumed verification token.
    pub async fn find_by_remember_token(
        db: &PgPool,
        token: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, remember_token, email_verified_at,
                   created_at, updated_at
            FROM users
            WHERE remember_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Consume the verification token and stamp the verification time.
    /// The token is set to the empty string so it can never match again.
    pub async fn mark_email_verified(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET remember_token = '', email_verified_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }
}

/// Add the token to the denylist, dropping rows that have already expired.
pub async fn revoke_token(
    db: &PgPool,
    jti: Uuid,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < now()")
        .execute(db)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO revoked_tokens (jti, expires_at)
        VALUES ($1, $2)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(jti)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn is_token_revoked(db: &PgPool, jti: Uuid) -> anyhow::Result<bool> {
    let hit = sqlx::query_scalar::<_, i32>("SELECT 1 FROM revoked_tokens WHERE jti = $1")
        .bind(jti)
        .fetch_optional(db)
        .await?;
    Ok(hit.is_some())
}
