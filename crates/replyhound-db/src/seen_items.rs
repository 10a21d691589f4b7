//! Database operations for the `seen_items` ledger.

use sqlx::PgPool;

use crate::DbError;

/// Insert `dedup_key` unless it already exists.
///
/// Returns `true` only for the call that created the row, so concurrent
/// callers racing on one key get exactly one winner.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn insert_seen_if_absent(
    pool: &PgPool,
    dedup_key: &str,
    source: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO seen_items (dedup_key, source) VALUES ($1, $2) \
         ON CONFLICT (dedup_key) DO NOTHING",
    )
    .bind(dedup_key)
    .bind(source)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn seen_key_exists(pool: &PgPool, dedup_key: &str) -> Result<bool, DbError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM seen_items WHERE dedup_key = $1)")
            .bind(dedup_key)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Count how many of `keys` are present in the ledger.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_seen_keys(pool: &PgPool, keys: &[String]) -> Result<usize, DbError> {
    if keys.is_empty() {
        return Ok(0);
    }

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM seen_items WHERE dedup_key = ANY($1)")
            .bind(keys)
            .fetch_one(pool)
            .await?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Delete `dedup_key`. Deleting a missing key is not an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_seen_key(pool: &PgPool, dedup_key: &str) -> Result<(), DbError> {
    sqlx::query("DELETE FROM seen_items WHERE dedup_key = $1")
        .bind(dedup_key)
        .execute(pool)
        .await?;
    Ok(())
}
