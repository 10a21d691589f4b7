use replyhound_core::BusinessConfig;
use sqlx::PgPool;

use crate::DbError;

/// Upsert businesses and their campaigns from the seed file.
///
/// Businesses are matched by name, campaigns by `(business, platform)`.
/// Returns the number of businesses processed. Everything runs in one
/// transaction; any failure rolls back the whole batch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_businesses(
    pool: &PgPool,
    businesses: &[BusinessConfig],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for business in businesses {
        let business_id: i64 = sqlx::query_scalar(
            "INSERT INTO businesses (name, business_type, core_offering, preferred_tone, contact, location) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (name) DO UPDATE SET \
                 business_type = EXCLUDED.business_type, \
                 core_offering = EXCLUDED.core_offering, \
                 preferred_tone = EXCLUDED.preferred_tone, \
                 contact = EXCLUDED.contact, \
                 location = EXCLUDED.location, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(business.name.trim())
        .bind(business.business_type.trim())
        .bind(business.core_offering.trim())
        .bind(business.preferred_tone.as_str())
        .bind(business.contact.as_deref())
        .bind(business.location.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        for campaign in &business.campaigns {
            sqlx::query(
                "INSERT INTO campaigns (business_id, platform, status, keywords, target_groups) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (business_id, platform) DO UPDATE SET \
                     status = EXCLUDED.status, \
                     keywords = EXCLUDED.keywords, \
                     target_groups = EXCLUDED.target_groups, \
                     updated_at = NOW()",
            )
            .bind(business_id)
            .bind(campaign.platform.as_str())
            .bind(campaign.status.as_str())
            .bind(campaign.normalized_keywords())
            .bind(campaign.normalized_target_groups())
            .execute(&mut *tx)
            .await?;
        }

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
