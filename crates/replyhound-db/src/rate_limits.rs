//! Database operations for fixed-window `rate_limit_buckets`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Bucket state after an increment.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BucketRow {
    pub count: i32,
    pub reset_at: DateTime<Utc>,
}

/// Atomically count one request against `(limiter_name, key)`.
///
/// A missing bucket, or one whose window ended at or before `now`, is
/// (re)started with `count = 1` and `reset_at = window_end`. Otherwise the
/// stored count is incremented and its `reset_at` kept.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn increment_or_insert_bucket(
    pool: &PgPool,
    limiter_name: &str,
    key: &str,
    now: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<BucketRow, DbError> {
    let row = sqlx::query_as::<_, BucketRow>(
        "INSERT INTO rate_limit_buckets (limiter_name, key, count, reset_at) \
         VALUES ($1, $2, 1, $4) \
         ON CONFLICT (limiter_name, key) DO UPDATE SET \
             count = CASE WHEN rate_limit_buckets.reset_at <= $3 THEN 1 \
                          ELSE rate_limit_buckets.count + 1 END, \
             reset_at = CASE WHEN rate_limit_buckets.reset_at <= $3 THEN EXCLUDED.reset_at \
                             ELSE rate_limit_buckets.reset_at END \
         RETURNING count, reset_at",
    )
    .bind(limiter_name)
    .bind(key)
    .bind(now)
    .bind(window_end)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Delete every bucket whose window ended at or before `now`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn sweep_expired_buckets(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM rate_limit_buckets WHERE reset_at <= $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
