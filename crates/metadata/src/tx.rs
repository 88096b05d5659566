//! Scoped transactions.

use crate::error::MetadataResult;
use futures::future::BoxFuture;
use sqlx::{Database, Pool, Transaction};

/// Run `f` inside a transaction on `pool`.
///
/// Commits when `f` returns `Ok` and rolls back on every `Err`. Inside the
/// closure, execute statements against `&mut **tx`:
///
/// ```ignore
/// with_transaction(&pool, move |tx| {
///     Box::pin(async move {
///         sqlx::query("DELETE FROM steps WHERE id = ?")
///             .bind(step_id)
///             .execute(&mut **tx)
///             .await?;
///         Ok(())
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<DB, T, F>(pool: &Pool<DB>, f: F) -> MetadataResult<T>
where
    DB: Database,
    T: Send,
    F: for<'t> FnOnce(&'t mut Transaction<'static, DB>) -> BoxFuture<'t, MetadataResult<T>>
        + Send,
{
    let mut tx = pool.begin().await?;
    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(e)
        }
    }
}
