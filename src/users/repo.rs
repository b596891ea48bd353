use super::models::{Page, User, UserFilter, UserStatus};
use crate::auth::Role;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use tracing::{Instrument, info_span};
use uuid::Uuid;

/// User persistence.
///
/// Role filters are optional: `None` matches any role, `Some(roles)` only the listed ones.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Returns `false` when the email is already taken.
    async fn create_user(&self, user: &User) -> Result<bool>;

    async fn get_user_by_email(&self, email: &str, roles: Option<&[Role]>) -> Result<Option<User>>;

    async fn get_user_by_id(&self, id: Uuid, roles: Option<&[Role]>) -> Result<Option<User>>;

    async fn list_users_by_role(&self, role: Role, filter: &UserFilter) -> Result<Page<User>>;

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<()>;

    /// Persist name and email changes. Returns `false` when the email is taken.
    async fn update_user(&self, user: &User) -> Result<bool>;

    async fn delete_user(&self, id: Uuid) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

const USER_COLUMNS: &str = r"
    id, full_name, email, status::text AS status, role::text AS role, avatar,
    EXTRACT(EPOCH FROM created_at)::bigint AS created_at,
    EXTRACT(EPOCH FROM updated_at)::bigint AS updated_at
";

fn role_names(roles: Option<&[Role]>) -> Option<Vec<String>> {
    roles.map(|roles| roles.iter().map(|role| role.as_str().to_string()).collect())
}

pub(crate) fn query_span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: &User) -> Result<bool> {
        let query = r"
            INSERT INTO users (id, full_name, email, status, role, avatar, created_at)
            VALUES ($1, $2, $3, $4::user_status, $5::user_role, $6, to_timestamp($7))
        ";
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(user.status.as_str())
            .bind(user.role.as_str())
            .bind(&user.avatar)
            .bind(user.created_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to insert user"),
        }
    }

    async fn get_user_by_email(&self, email: &str, roles: Option<&[Role]>) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE lower(email) = lower($1)
               AND ($2::text[] IS NULL OR role::text = ANY($2))"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .bind(role_names(roles))
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch user by email")
    }

    async fn get_user_by_id(&self, id: Uuid, roles: Option<&[Role]>) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE id = $1
               AND ($2::text[] IS NULL OR role::text = ANY($2))"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role_names(roles))
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch user by id")
    }

    async fn list_users_by_role(&self, role: Role, filter: &UserFilter) -> Result<Page<User>> {
        let status = filter.status.map(UserStatus::as_str);
        let full_name = filter.full_name_pattern().map(|name| format!("%{name}%"));
        let condition = r"
            role = $1::user_role
            AND ($2::text IS NULL OR status::text = $2)
            AND ($3::text IS NULL OR full_name ILIKE $3)
        ";

        let count_query = format!("SELECT COUNT(*) AS total FROM users WHERE {condition}");
        let total: i64 = sqlx::query(&count_query)
            .bind(role.as_str())
            .bind(status)
            .bind(full_name.as_deref())
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", &count_query))
            .await
            .context("Failed to count users")?
            .get("total");

        let page_query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {condition}
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        );
        let users = sqlx::query_as::<_, User>(&page_query)
            .bind(role.as_str())
            .bind(status)
            .bind(full_name.as_deref())
            .bind(i64::from(filter.per_page()))
            .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &page_query))
            .await
            .context("Failed to list users")?;

        Ok(Page::new(
            users,
            filter,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<()> {
        let query = "UPDATE users SET status = $2::user_status, updated_at = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("Failed to update user status")?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        let query = r"
            UPDATE users SET full_name = $2, email = $3, updated_at = NOW()
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.full_name)
            .bind(&user.email)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to update user"),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let query = "DELETE FROM users WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete user")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("Failed to acquire database connection")?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("Failed to ping database")
    }
}
