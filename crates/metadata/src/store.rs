//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ImageRepo, ManualRepo, StepRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: UserRepo + ManualRepo + StepRepo + ImageRepo + Send + Sync {
    /// Create tables and indexes if they do not exist.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Close the connection pool. Further calls fail.
    async fn close(&self);

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// SQLite-based metadata store.
///
/// The pool holds a single connection, so transactions never interleave and
/// step ordering mutations on one manual are serialized.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "opened sqlite metadata store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
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
        "sqlite"
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::tx::with_transaction;
    use guideforge_core::StepOrder;
    use guideforge_core::ordering::{next_order, validate_insert_position, validate_reorder};
    use sqlx::Transaction;
    use time::OffsetDateTime;

    type SqliteTx = Transaction<'static, Sqlite>;

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &NewUser) -> MetadataResult<UserRow> {
            let now = OffsetDateTime::now_utc();
            sqlx::query_as::<_, UserRow>(
                r#"
                INSERT INTO users (username, email, password_hash, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MetadataError::from_unique(e, || format!("email {}", user.email)))
        }

        async fn get_user(&self, user_id: i64) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn update_user(&self, user_id: i64, update: &UserUpdate) -> MetadataResult<UserRow> {
            sqlx::query_as::<_, UserRow>(
                r#"
                UPDATE users SET username = ?, email = ?, profile_image = ?, updated_at = ?
                WHERE id = ?
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
            let result =
                sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
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
            let result = sqlx::query("DELETE FROM users WHERE id = ?")
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
    impl ManualRepo for SqliteStore {
        async fn create_manual(&self, manual: &NewManual) -> MetadataResult<ManualRow> {
            let now = OffsetDateTime::now_utc();
            let row = sqlx::query_as::<_, ManualRow>(
                r#"
                INSERT INTO manuals (user_id, title, description, category, is_public, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(manual.user_id)
            .bind(&manual.title)
            .bind(&manual.description)
            .bind(&manual.category)
            .bind(manual.is_public)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                MetadataError::from_missing_parent(e, || format!("user {}", manual.user_id))
            })?;
            Ok(row)
        }

        async fn get_manual(&self, manual_id: i64) -> MetadataResult<Option<ManualRow>> {
            let row = sqlx::query_as::<_, ManualRow>("SELECT * FROM manuals WHERE id = ?")
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
                SET title = ?, description = ?, category = ?, is_public = ?, updated_at = ?
                WHERE id = ?
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
                SELECT * FROM manuals WHERE user_id = ?
                ORDER BY updated_at DESC, id DESC
                LIMIT ? OFFSET ?
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
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manuals WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
            Ok(count)
        }

        async fn list_manual_ids_by_user(&self, user_id: i64) -> MetadataResult<Vec<i64>> {
            let ids: Vec<i64> =
                sqlx::query_scalar("SELECT id FROM manuals WHERE user_id = ? ORDER BY id")
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(ids)
        }

        async fn list_public_manuals(
            &self,
            limit: i64,
            offset: i64,
        ) -> MetadataResult<Vec<ManualRow>> {
            let rows = sqlx::query_as::<_, ManualRow>(
                r#"
                SELECT * FROM manuals WHERE is_public = 1
                ORDER BY updated_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_public_manuals(&self) -> MetadataResult<i64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manuals WHERE is_public = 1")
                .fetch_one(&self.pool)
                .await?;
            Ok(count)
        }
    }

    #[async_trait]
    impl StepRepo for SqliteStore {
        async fn get_step(&self, step_id: i64) -> MetadataResult<Option<StepRow>> {
            let row = sqlx::query_as::<_, StepRow>("SELECT * FROM steps WHERE id = ?")
                .bind(step_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_steps(&self, manual_id: i64) -> MetadataResult<Vec<StepRow>> {
            let rows = sqlx::query_as::<_, StepRow>(
                "SELECT * FROM steps WHERE manual_id = ? ORDER BY order_number ASC, id ASC",
            )
            .bind(manual_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_step(&self, step_id: i64, update: &StepUpdate) -> MetadataResult<StepRow> {
            sqlx::query_as::<_, StepRow>(
                "UPDATE steps SET title = ?, content = ?, updated_at = ? WHERE id = ? RETURNING *",
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
            with_transaction(&self.pool, move |tx| {
                Box::pin(delete_step_row(tx, step_id))
            })
            .await
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
    impl ImageRepo for SqliteStore {
        async fn create_image(&self, image: &NewImage) -> MetadataResult<ImageRow> {
            let row = sqlx::query_as::<_, ImageRow>(
                r#"
                INSERT INTO images (step_id, file_path, file_name, file_size, mime_type, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
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
            let row = sqlx::query_as::<_, ImageRow>("SELECT * FROM images WHERE id = ?")
                .bind(image_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_images_by_step(&self, step_id: i64) -> MetadataResult<Vec<ImageRow>> {
            let rows = sqlx::query_as::<_, ImageRow>(
                "SELECT * FROM images WHERE step_id = ? ORDER BY id ASC",
            )
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
                WHERE steps.manual_id = ?
                ORDER BY steps.order_number ASC, steps.id ASC, images.id ASC
                "#,
            )
            .bind(manual_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_image(&self, image_id: i64) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM images WHERE id = ?")
                .bind(image_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::not_found("image", image_id));
            }
            Ok(())
        }
    }

    /// Confirm the manual exists inside the transaction.
    async fn require_manual(tx: &mut SqliteTx, manual_id: i64) -> MetadataResult<()> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM manuals WHERE id = ?")
            .bind(manual_id)
            .fetch_optional(&mut **tx)
            .await?;
        found
            .map(|_| ())
            .ok_or_else(|| MetadataError::not_found("manual", manual_id))
    }

    async fn delete_manual_rows(
        tx: &mut SqliteTx,
        manual_id: i64,
    ) -> MetadataResult<ManualDeleteStats> {
        let images = sqlx::query(
            "DELETE FROM images WHERE step_id IN (SELECT id FROM steps WHERE manual_id = ?)",
        )
        .bind(manual_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        let steps = sqlx::query("DELETE FROM steps WHERE manual_id = ?")
            .bind(manual_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        let manuals = sqlx::query("DELETE FROM manuals WHERE id = ?")
            .bind(manual_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if manuals == 0 {
            return Err(MetadataError::not_found("manual", manual_id));
        }
        Ok(ManualDeleteStats { steps, images })
    }

    async fn insert_step_row(tx: &mut SqliteTx, step: NewStep) -> MetadataResult<StepRow> {
        require_manual(tx, step.manual_id).await?;

        let (count, max_order): (i64, Option<i32>) =
            sqlx::query_as("SELECT COUNT(*), MAX(order_number) FROM steps WHERE manual_id = ?")
                .bind(step.manual_id)
                .fetch_one(&mut **tx)
                .await?;

        let order_number = match step.order_number {
            Some(position) => {
                validate_insert_position(position, count)?;
                sqlx::query(
                    "UPDATE steps SET order_number = order_number + 1 \
                     WHERE manual_id = ? AND order_number >= ?",
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
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(step.manual_id)
        .bind(order_number)
        .bind(&step.title)
        .bind(&step.content)
        .bind(now)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    async fn delete_step_row(tx: &mut SqliteTx, step_id: i64) -> MetadataResult<StepRow> {
        let step = sqlx::query_as::<_, StepRow>("SELECT * FROM steps WHERE id = ?")
            .bind(step_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| MetadataError::not_found("step", step_id))?;

        sqlx::query("DELETE FROM images WHERE step_id = ?")
            .bind(step_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query("DELETE FROM steps WHERE id = ?")
            .bind(step_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "UPDATE steps SET order_number = order_number - 1 \
             WHERE manual_id = ? AND order_number > ?",
        )
        .bind(step.manual_id)
        .bind(step.order_number)
        .execute(&mut **tx)
        .await?;

        Ok(step)
    }

    async fn apply_reorder(
        tx: &mut SqliteTx,
        manual_id: i64,
        orders: Vec<StepOrder>,
    ) -> MetadataResult<Vec<StepRow>> {
        require_manual(tx, manual_id).await?;

        let current: Vec<StepOrder> = sqlx::query_as::<_, (i64, i32)>(
            "SELECT id, order_number FROM steps WHERE manual_id = ?",
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
                "UPDATE steps SET order_number = ?, updated_at = ? WHERE id = ? AND manual_id = ?",
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
            "SELECT * FROM steps WHERE manual_id = ? ORDER BY order_number ASC, id ASC",
        )
        .bind(manual_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    profile_image TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS manuals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    is_public INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_manuals_user ON manuals(user_id, updated_at);
CREATE INDEX IF NOT EXISTS idx_manuals_public ON manuals(is_public, updated_at);

-- No unique index on (manual_id, order_number): inserts and reorders pass
-- through transient duplicates before commit.
CREATE TABLE IF NOT EXISTS steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    manual_id INTEGER NOT NULL REFERENCES manuals(id) ON DELETE CASCADE,
    order_number INTEGER NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_steps_manual_order ON steps(manual_id, order_number);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    step_id INTEGER NOT NULL REFERENCES steps(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    mime_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_images_step ON images(step_id);
"#;
