//! Database operations for `leads`, `ai_responses` and `response_feedback`.

use chrono::{DateTime, Utc};
use replyhound_core::{
    FeedbackKind, NewLead, PersistedLead, Platform, ResponseContext, ResponseStatus,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `leads` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadRow {
    pub id: i64,
    pub public_id: Uuid,
    pub business_id: i64,
    pub campaign_id: Option<i64>,
    pub platform: String,
    pub group_name: Option<String>,
    pub author_name: Option<String>,
    pub original_post: String,
    pub post_url: Option<String>,
    pub intent_score: i16,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A response joined with the lead it answers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResponseContextRow {
    pub response_id: i64,
    pub lead_id: i64,
    pub business_id: i64,
    pub content: String,
    pub status: String,
    pub platform: String,
    pub post_url: Option<String>,
}

impl TryFrom<ResponseContextRow> for ResponseContext {
    type Error = DbError;

    fn try_from(row: ResponseContextRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ResponseStatus>()
            .map_err(|_| DbError::InvalidColumn {
                column: "status",
                value: row.status.clone(),
            })?;
        let platform = row
            .platform
            .parse::<Platform>()
            .map_err(|_| DbError::InvalidColumn {
                column: "platform",
                value: row.platform.clone(),
            })?;
        Ok(ResponseContext {
            response_id: row.response_id,
            lead_id: row.lead_id,
            business_id: row.business_id,
            content: row.content,
            status,
            platform,
            post_url: row.post_url,
        })
    }
}

// ---------------------------------------------------------------------------
// Leads and responses
// ---------------------------------------------------------------------------

/// Insert a `matched` lead and its `pending` reply in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either insert fails; nothing is committed then.
pub async fn persist_lead_with_response(
    pool: &PgPool,
    lead: &NewLead,
    content: &str,
) -> Result<PersistedLead, DbError> {
    let mut tx = pool.begin().await?;

    let lead_id: i64 = sqlx::query_scalar(
        "INSERT INTO leads (business_id, campaign_id, platform, group_name, author_name, \
                            original_post, post_url, intent_score, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'matched') \
         RETURNING id",
    )
    .bind(lead.business_id)
    .bind(lead.campaign_id)
    .bind(lead.platform.as_str())
    .bind(lead.group_name.as_deref())
    .bind(lead.author_name.as_deref())
    .bind(&lead.original_post)
    .bind(lead.post_url.as_deref())
    .bind(i16::from(lead.intent_score))
    .fetch_one(&mut *tx)
    .await?;

    let response_id: i64 = sqlx::query_scalar(
        "INSERT INTO ai_responses (lead_id, content, status) \
         VALUES ($1, $2, 'pending') \
         RETURNING id",
    )
    .bind(lead_id)
    .bind(content)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(PersistedLead {
        lead_id,
        response_id,
    })
}

/// Move a response to `status`, stamping `approved_at` on approval.
///
/// Returns `false` if the response already had that status or does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_response_status(
    pool: &PgPool,
    response_id: i64,
    status: ResponseStatus,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE ai_responses \
         SET status = $2, \
             approved_at = CASE WHEN $2 = 'approved' THEN NOW() ELSE approved_at END \
         WHERE id = $1 AND status <> $2",
    )
    .bind(response_id)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns a response with its lead's business, platform and URL.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_response_context(
    pool: &PgPool,
    response_id: i64,
) -> Result<Option<ResponseContext>, DbError> {
    let row = sqlx::query_as::<_, ResponseContextRow>(
        "SELECT r.id AS response_id, r.lead_id, l.business_id, r.content, r.status, \
                l.platform, l.post_url \
         FROM ai_responses r \
         JOIN leads l ON l.id = r.lead_id \
         WHERE r.id = $1",
    )
    .bind(response_id)
    .fetch_optional(pool)
    .await?;

    row.map(ResponseContext::try_from).transpose()
}

/// Most recent leads for a business, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_leads(
    pool: &PgPool,
    business_id: i64,
    limit: i64,
) -> Result<Vec<LeadRow>, DbError> {
    let rows = sqlx::query_as::<_, LeadRow>(
        "SELECT id, public_id, business_id, campaign_id, platform, group_name, author_name, \
                original_post, post_url, intent_score, status, created_at \
         FROM leads \
         WHERE business_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(business_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

fn parse_feedback(value: String) -> Result<FeedbackKind, DbError> {
    value
        .parse::<FeedbackKind>()
        .map_err(|_| DbError::InvalidColumn {
            column: "feedback",
            value,
        })
}

/// The newest `limit` feedback rows across a business's responses,
/// returned oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_feedback_for_business(
    pool: &PgPool,
    business_id: i64,
    limit: i64,
) -> Result<Vec<FeedbackKind>, DbError> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT feedback FROM ( \
             SELECT f.id, f.feedback \
             FROM response_feedback f \
             JOIN ai_responses r ON r.id = f.response_id \
             JOIN leads l ON l.id = r.lead_id \
             WHERE l.business_id = $1 \
             ORDER BY f.id DESC \
             LIMIT $2 \
         ) recent \
         ORDER BY id ASC",
    )
    .bind(business_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_feedback).collect()
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_feedback_for_response(
    pool: &PgPool,
    response_id: i64,
) -> Result<Option<FeedbackKind>, DbError> {
    let row: Option<String> =
        sqlx::query_scalar("SELECT feedback FROM response_feedback WHERE response_id = $1")
            .bind(response_id)
            .fetch_optional(pool)
            .await?;

    row.map(parse_feedback).transpose()
}

/// Record feedback unless the response already has some.
///
/// Returns `true` if this call inserted the row. The unique constraint on
/// `response_id` makes concurrent duplicate taps a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn insert_feedback_if_absent(
    pool: &PgPool,
    response_id: i64,
    kind: FeedbackKind,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO response_feedback (response_id, feedback) \
         VALUES ($1, $2) \
         ON CONFLICT (response_id) DO NOTHING",
    )
    .bind(response_id)
    .bind(kind.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
