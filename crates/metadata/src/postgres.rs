//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{ImageRepo, ManualRepo, StepRepo, UserRepo};
use crate::store::MetadataStore;
use crate::tx::with_transaction;
use async_trait::async_trait;
use guideforge_core::StepOrder;
use guideforge_core::config::PgSslMode;
use guideforge_core::ordering::{next_order, validate_insert_position, validate_reorder};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres, Transaction};
use std::str::FromStr;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

type PgTx = Transaction<'static, Postgres>;

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
///
/// Transactions that change step order take a row lock on the parent manual
/// (`SELECT ... FOR UPDATE`) before reading any step, so concurrent inserts,
/// deletes and reorders on one manual are serialized.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password arrive separately (e.g. from an environment variable).
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl UserRepo for PostgresStore {
    async fn create_user(&self, user: &NewUser) -> MetadataResult<UserRow> {
        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MetadataError::from_unique(e, || format!("email {}", user.email)))
    }

    async fn get_user(&self, user_id: i64) -> MetadataResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_user(&self, user_id: i64, update: &UserUpdate) -> MetadataResult<UserRow> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET username = $1, email = $2, profile_image = $3, updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.profile_image)
        .bind(OffsetDateTime::now_utc())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MetadataError::from_unique(e, || format!("email {}", update.email)))?
        .ok_or_else(|| MetadataError::not_found("user", user_id))
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> MetadataResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(OffsetDateTime::now_utc())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: i64) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::not_found("user", user_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ManualRepo for PostgresStore {
    async fn create_manual(&self, manual: &NewManual) -> MetadataResult<ManualRow> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, ManualRow>(
            r#"
            INSERT INTO manuals (user_id, title, description, category, is_public, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(manual.user_id)
        .bind(&manual.title)
        .bind(&manual.description)
        .bind(&manual.category)
        .bind(manual.is_public)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_missing_parent(e, || format!("user {}", manual.user_id))
        })?;
        Ok(row)
    }

    async fn get_manual(&self, manual_id: i64) -> MetadataResult<Option<ManualRow>> {
        let row = sqlx::query_as::<_, ManualRow>("SELECT * FROM manuals WHERE id = $1")
            .bind(manual_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_manual(
        &self,
        manual_id: i64,
        update: &ManualUpdate,
    ) -> MetadataResult<ManualRow> {
        sqlx::query_as::<_, ManualRow>(
            r#"
            UPDATE manuals
            SET title = $1, description = $2, category = $3, is_public = $4, updated_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.category)
        .bind(update.is_public)
        .bind(OffsetDateTime::now_utc())
        .bind(manual_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::not_found("manual", manual_id))
    }

    async fn delete_manual(&self, manual_id: i64) -> MetadataResult<ManualDeleteStats> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(delete_manual_rows(tx, manual_id))
        })
        .await
    }

    async fn list_manuals_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> MetadataResult<Vec<ManualRow>> {
        let rows = sqlx::query_as::<_, ManualRow>(
            r#"
            SELECT * FROM manuals WHERE user_id = $1
            ORDER BY updated_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_manuals_by_user(&self, user_id: i64) -> MetadataResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manuals WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_manual_ids_by_user(&self, user_id: i64) -> MetadataResult<Vec<i64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM manuals WHERE user_id = $1 ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn list_public_manuals(&self, limit: i64, offset: i64) -> MetadataResult<Vec<ManualRow>> {
        let rows = sqlx::query_as::<_, ManualRow>(
            r#"
            SELECT * FROM manuals WHERE is_public = TRUE
            ORDER BY updated_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_public_manuals(&self) -> MetadataResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manuals WHERE is_public = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl StepRepo for PostgresStore {
    async fn get_step(&self, step_id: i64) -> MetadataResult<Option<StepRow>> {
        let row = sqlx::query_as::<_, StepRow>("SELECT * FROM steps WHERE id = $1")
            .bind(step_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_steps(&self, manual_id: i64) -> MetadataResult<Vec<StepRow>> {
        let rows = sqlx::query_as::<_, StepRow>(
            "SELECT * FROM steps WHERE manual_id = $1 ORDER BY order_number ASC, id ASC",
        )
        .bind(manual_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_step(&self, step_id: i64, update: &StepUpdate) -> MetadataResult<StepRow> {
        sqlx::query_as::<_, StepRow>(
            "UPDATE steps SET title = $1, content = $2, updated_at = $3 WHERE id = $4 RETURNING *",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(OffsetDateTime::now_utc())
        .bind(step_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::not_found("step", step_id))
    }

    async fn insert_step(&self, step: &NewStep) -> MetadataResult<StepRow> {
        let step = step.clone();
        with_transaction(&self.pool, move |tx| Box::pin(insert_step_row(tx, step))).await
    }

    async fn delete_step_and_compact(&self, step_id: i64) -> MetadataResult<StepRow> {
        with_transaction(&self.pool, move |tx| Box::pin(delete_step_row(tx, step_id))).await
    }

    async fn reorder_steps(
        &self,
        manual_id: i64,
        orders: &[StepOrder],
    ) -> MetadataResult<Vec<StepRow>> {
        let orders = orders.to_vec();
        with_transaction(&self.pool, move |tx| {
            Box::pin(apply_reorder(tx, manual_id, orders))
        })
        .await
    }
}

#[async_trait]
impl ImageRepo for PostgresStore {
    async fn create_image(&self, image: &NewImage) -> MetadataResult<ImageRow> {
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            INSERT INTO images (step_id, file_path, file_name, file_size, mime_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(image.step_id)
        .bind(&image.file_path)
        .bind(&image.file_name)
        .bind(image.file_size)
        .bind(&image.mime_type)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_missing_parent(e, || format!("step {}", image.step_id))
        })?;
        Ok(row)
    }

    async fn get_image(&self, image_id: i64) -> MetadataResult<Option<ImageRow>> {
        let row = sqlx::query_as::<_, ImageRow>("SELECT * FROM images WHERE id = $1")
            .bind(image_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_images_by_step(&self, step_id: i64) -> MetadataResult<Vec<ImageRow>> {
        let rows =
            sqlx::query_as::<_, ImageRow>("SELECT * FROM images WHERE step_id = $1 ORDER BY id ASC")
                .bind(step_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn list_images_by_manual(&self, manual_id: i64) -> MetadataResult<Vec<ImageRow>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT images.* FROM images
            JOIN steps ON steps.id = images.step_id
            WHERE steps.manual_id = $1
            ORDER BY steps.order_number ASC, steps.id ASC, images.id ASC
            "#,
        )
        .bind(manual_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_image(&self, image_id: i64) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(image_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::not_found("image", image_id));
        }
        Ok(())
    }
}

/// Take the per-manual row lock. Held until the transaction ends.
async fn lock_manual(tx: &mut PgTx, manual_id: i64) -> MetadataResult<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM manuals WHERE id = $1 FOR UPDATE")
        .bind(manual_id)
        .fetch_optional(&mut **tx)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| MetadataError::not_found("manual", manual_id))
}

async fn delete_manual_rows(tx: &mut PgTx, manual_id: i64) -> MetadataResult<ManualDeleteStats> {
    lock_manual(tx, manual_id).await?;

    let images = sqlx::query(
        "DELETE FROM images WHERE step_id IN (SELECT id FROM steps WHERE manual_id = $1)",
    )
    .bind(manual_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    let steps = sqlx::query("DELETE FROM steps WHERE manual_id = $1")
        .bind(manual_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM manuals WHERE id = $1")
        .bind(manual_id)
        .execute(&mut **tx)
        .await?;

    Ok(ManualDeleteStats { steps, images })
}

async fn insert_step_row(tx: &mut PgTx, step: NewStep) -> MetadataResult<StepRow> {
    lock_manual(tx, step.manual_id).await?;

    let (count, max_order): (i64, Option<i32>) =
        sqlx::query_as("SELECT COUNT(*), MAX(order_number) FROM steps WHERE manual_id = $1")
            .bind(step.manual_id)
            .fetch_one(&mut **tx)
            .await?;

    let order_number = match step.order_number {
        Some(position) => {
            validate_insert_position(position, count)?;
            sqlx::query(
                "UPDATE steps SET order_number = order_number + 1 \
                 WHERE manual_id = $1 AND order_number >= $2",
            )
            .bind(step.manual_id)
            .bind(position)
            .execute(&mut **tx)
            .await?;
            position
        }
        None => next_order(max_order),
    };

    let now = OffsetDateTime::now_utc();
    let row = sqlx::query_as::<_, StepRow>(
        r#"
        INSERT INTO steps (manual_id, order_number, title, content, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING *
        "#,
    )
    .bind(step.manual_id)
    .bind(order_number)
    .bind(&step.title)
    .bind(&step.content)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

async fn delete_step_row(tx: &mut PgTx, step_id: i64) -> MetadataResult<StepRow> {
    let manual_id: i64 = sqlx::query_scalar("SELECT manual_id FROM steps WHERE id = $1")
        .bind(step_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| MetadataError::not_found("step", step_id))?;

    lock_manual(tx, manual_id).await?;

    // Re-read under the lock; a concurrent delete may have moved or removed the step.
    let step = sqlx::query_as::<_, StepRow>("SELECT * FROM steps WHERE id = $1")
        .bind(step_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| MetadataError::not_found("step", step_id))?;

    sqlx::query("DELETE FROM images WHERE step_id = $1")
        .bind(step_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM steps WHERE id = $1")
        .bind(step_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        "UPDATE steps SET order_number = order_number - 1 \
         WHERE manual_id = $1 AND order_number > $2",
    )
    .bind(step.manual_id)
    .bind(step.order_number)
    .execute(&mut **tx)
    .await?;

    Ok(step)
}

async fn apply_reorder(
    tx: &mut PgTx,
    manual_id: i64,
    orders: Vec<StepOrder>,
) -> MetadataResult<Vec<StepRow>> {
    lock_manual(tx, manual_id).await?;

    let current: Vec<StepOrder> = sqlx::query_as::<_, (i64, i32)>(
        "SELECT id, order_number FROM steps WHERE manual_id = $1",
    )
    .bind(manual_id)
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .map(|(id, order_number)| StepOrder::new(id, order_number))
    .collect();

    validate_reorder(&orders, &current)?;

    let now = OffsetDateTime::now_utc();
    for entry in &orders {
        let affected = sqlx::query(
            "UPDATE steps SET order_number = $1, updated_at = $2 WHERE id = $3 AND manual_id = $4",
        )
        .bind(entry.order_number)
        .bind(now)
        .bind(entry.id)
        .bind(manual_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        if affected != 1 {
            return Err(MetadataError::Internal(format!(
                "step {} was not updated during reorder",
                entry.id
            )));
        }
    }

    let rows = sqlx::query_as::<_, StepRow>(
        "SELECT * FROM steps WHERE manual_id = $1 ORDER BY order_number ASC, id ASC",
    )
    .bind(manual_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}
