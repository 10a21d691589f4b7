//! Database operations for the `businesses` and `campaigns` tables.

use chrono::{DateTime, Utc};
use replyhound_core::ports::BusinessField;
use replyhound_core::{
    Business, Campaign, CampaignStatus, MonitorTarget, NewBusiness, Platform, Tone,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `businesses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BusinessRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub business_type: String,
    pub core_offering: String,
    pub preferred_tone: String,
    pub contact: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BusinessRow> for Business {
    type Error = DbError;

    fn try_from(row: BusinessRow) -> Result<Self, Self::Error> {
        let preferred_tone = row
            .preferred_tone
            .parse::<Tone>()
            .map_err(|_| DbError::InvalidColumn {
                column: "preferred_tone",
                value: row.preferred_tone.clone(),
            })?;
        Ok(Business {
            id: row.id,
            name: row.name,
            business_type: row.business_type,
            core_offering: row.core_offering,
            preferred_tone,
            contact: row.contact,
            location: row.location,
        })
    }
}

/// A row from the `campaigns` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub business_id: i64,
    pub platform: String,
    pub status: String,
    pub keywords: Vec<String>,
    pub target_groups: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DbError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let platform = row.platform.parse::<Platform>().map_err(|_| DbError::InvalidColumn {
            column: "platform",
            value: row.platform.clone(),
        })?;
        let status = row.status.parse::<CampaignStatus>().map_err(|_| DbError::InvalidColumn {
            column: "status",
            value: row.status.clone(),
        })?;
        Ok(Campaign {
            id: row.id,
            business_id: row.business_id,
            platform,
            status,
            keywords: row.keywords,
            target_groups: row.target_groups,
        })
    }
}

const BUSINESS_COLUMNS: &str = "b.id, b.public_id, b.name, b.business_type, b.core_offering, \
     b.preferred_tone, b.contact, b.location, b.created_at, b.updated_at";

const CAMPAIGN_COLUMNS: &str = "c.id, c.business_id, c.platform, c.status, c.keywords, \
     c.target_groups, c.created_at, c.updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns every business, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidColumn`]
/// if a stored tone is not recognised.
pub async fn list_businesses(pool: &PgPool) -> Result<Vec<Business>, DbError> {
    let rows = sqlx::query_as::<_, BusinessRow>(&format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses b ORDER BY b.id"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Business::try_from).collect()
}

/// Returns a single business by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_business(pool: &PgPool, business_id: i64) -> Result<Option<Business>, DbError> {
    let row = sqlx::query_as::<_, BusinessRow>(&format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses b WHERE b.id = $1"
    ))
    .bind(business_id)
    .fetch_optional(pool)
    .await?;

    row.map(Business::try_from).transpose()
}

/// Returns the active campaigns of one business, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn active_campaigns_for_business(
    pool: &PgPool,
    business_id: i64,
) -> Result<Vec<Campaign>, DbError> {
    let rows = sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns c \
         WHERE c.business_id = $1 AND c.status = 'active' \
         ORDER BY c.id"
    ))
    .bind(business_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Campaign::try_from).collect()
}

#[derive(sqlx::FromRow)]
struct TargetRow {
    #[sqlx(flatten)]
    business: BusinessRow,
    campaign_id: i64,
    platform: String,
    status: String,
    keywords: Vec<String>,
    target_groups: Vec<String>,
    campaign_created_at: DateTime<Utc>,
    campaign_updated_at: DateTime<Utc>,
}

/// Returns every active campaign on `platform` paired with its business,
/// in a stable order so poll cycles visit targets predictably.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn active_monitor_targets(
    pool: &PgPool,
    platform: Platform,
) -> Result<Vec<MonitorTarget>, DbError> {
    let rows = sqlx::query_as::<_, TargetRow>(&format!(
        "SELECT {BUSINESS_COLUMNS}, \
                c.id AS campaign_id, c.platform, c.status, c.keywords, c.target_groups, \
                c.created_at AS campaign_created_at, c.updated_at AS campaign_updated_at \
         FROM campaigns c \
         JOIN businesses b ON b.id = c.business_id \
         WHERE c.platform = $1 AND c.status = 'active' \
         ORDER BY b.id, c.id"
    ))
    .bind(platform.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let business_id = row.business.id;
            let campaign = Campaign::try_from(CampaignRow {
                id: row.campaign_id,
                business_id,
                platform: row.platform,
                status: row.status,
                keywords: row.keywords,
                target_groups: row.target_groups,
                created_at: row.campaign_created_at,
                updated_at: row.campaign_updated_at,
            })?;
            Ok::<_, DbError>(MonitorTarget {
                business: Business::try_from(row.business)?,
                campaign,
            })
        })
        .collect()
}

/// Insert a business and, when a platform was chosen, its first campaign.
/// Both rows are written in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails (including a duplicate name).
pub async fn create_business_with_campaign(
    pool: &PgPool,
    new: &NewBusiness,
) -> Result<Business, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, BusinessRow>(
        "INSERT INTO businesses (name, business_type, core_offering, preferred_tone, contact, location) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, public_id, name, business_type, core_offering, preferred_tone, \
                   contact, location, created_at, updated_at",
    )
    .bind(new.name.trim())
    .bind(new.business_type.trim())
    .bind(new.core_offering.trim())
    .bind(new.preferred_tone.as_str())
    .bind(new.contact.as_deref())
    .bind(new.location.as_deref())
    .fetch_one(&mut *tx)
    .await?;

    if let Some(platform) = new.platform {
        sqlx::query(
            "INSERT INTO campaigns (business_id, platform, status, keywords, target_groups) \
             VALUES ($1, $2, 'active', $3, $4)",
        )
        .bind(row.id)
        .bind(platform.as_str())
        .bind(&new.keywords)
        .bind(&new.target_groups)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Business::try_from(row)
}

/// Delete a business; campaigns, leads, replies and feedback cascade.
///
/// Returns `true` if a row was deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_business(pool: &PgPool, business_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
        .bind(business_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Update one editable profile field. `Keywords` takes a comma-separated
/// list and replaces the keywords of every campaign the business owns.
///
/// Returns `true` if any row changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_business_field(
    pool: &PgPool,
    business_id: i64,
    field: BusinessField,
    value: &str,
) -> Result<bool, DbError> {
    let value = value.trim();
    let query = match field {
        BusinessField::Name => {
            "UPDATE businesses SET name = $2, updated_at = NOW() WHERE id = $1"
        }
        BusinessField::Offering => {
            "UPDATE businesses SET core_offering = $2, updated_at = NOW() WHERE id = $1"
        }
        BusinessField::Contact => {
            "UPDATE businesses SET contact = $2, updated_at = NOW() WHERE id = $1"
        }
        BusinessField::Location => {
            "UPDATE businesses SET location = $2, updated_at = NOW() WHERE id = $1"
        }
        BusinessField::Keywords => {
            let keywords: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
            let result = sqlx::query(
                "UPDATE campaigns SET keywords = $2, updated_at = NOW() WHERE business_id = $1",
            )
            .bind(business_id)
            .bind(&keywords)
            .execute(pool)
            .await?;
            return Ok(result.rows_affected() > 0);
        }
    };

    let result = sqlx::query(query)
        .bind(business_id)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
