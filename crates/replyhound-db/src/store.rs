//! [`PgStore`]: the Postgres implementation of the storage ports.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use replyhound_core::ports::BusinessField;
use replyhound_core::{
    BucketState, BucketStore, Business, Campaign, FeedbackKind, LeadStore, MonitorTarget,
    NewBusiness, NewLead, PersistedLead, Platform, ResponseContext, ResponseStatus, SeenStore,
    StoreError,
};
use sqlx::PgPool;

use crate::{businesses, leads, rate_limits, seen_items};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn limit_to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl SeenStore for PgStore {
    async fn insert_if_absent(&self, key: &str, source: &str) -> Result<bool, StoreError> {
        Ok(seen_items::insert_seen_if_absent(&self.pool, key, source).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(seen_items::seen_key_exists(&self.pool, key).await?)
    }

    async fn count_existing(&self, keys: &[String]) -> Result<usize, StoreError> {
        Ok(seen_items::count_seen_keys(&self.pool, keys).await?)
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        Ok(seen_items::delete_seen_key(&self.pool, key).await?)
    }
}

#[async_trait]
impl BucketStore for PgStore {
    async fn increment_or_insert(
        &self,
        limiter: &str,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<BucketState, StoreError> {
        let window = chrono::Duration::from_std(window)
            .map_err(|e| StoreError::Corrupt(format!("rate-limit window out of range: {e}")))?;
        let row =
            rate_limits::increment_or_insert_bucket(&self.pool, limiter, key, now, now + window)
                .await?;
        Ok(BucketState {
            count: u32::try_from(row.count).unwrap_or(0),
            reset_at: row.reset_at,
        })
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(rate_limits::sweep_expired_buckets(&self.pool, now).await?)
    }
}

#[async_trait]
impl LeadStore for PgStore {
    async fn get_business(&self, business_id: i64) -> Result<Option<Business>, StoreError> {
        Ok(businesses::get_business(&self.pool, business_id).await?)
    }

    async fn list_businesses(&self) -> Result<Vec<Business>, StoreError> {
        Ok(businesses::list_businesses(&self.pool).await?)
    }

    async fn active_campaigns_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<Campaign>, StoreError> {
        Ok(businesses::active_campaigns_for_business(&self.pool, business_id).await?)
    }

    async fn active_monitor_targets(
        &self,
        platform: Platform,
    ) -> Result<Vec<MonitorTarget>, StoreError> {
        Ok(businesses::active_monitor_targets(&self.pool, platform).await?)
    }

    async fn persist_lead_with_response(
        &self,
        lead: &NewLead,
        content: &str,
    ) -> Result<PersistedLead, StoreError> {
        Ok(leads::persist_lead_with_response(&self.pool, lead, content).await?)
    }

    async fn update_response_status(
        &self,
        response_id: i64,
        status: ResponseStatus,
    ) -> Result<bool, StoreError> {
        Ok(leads::update_response_status(&self.pool, response_id, status).await?)
    }

    async fn response_context(
        &self,
        response_id: i64,
    ) -> Result<Option<ResponseContext>, StoreError> {
        Ok(leads::get_response_context(&self.pool, response_id).await?)
    }

    async fn recent_feedback(
        &self,
        business_id: i64,
        limit: usize,
    ) -> Result<Vec<FeedbackKind>, StoreError> {
        Ok(
            leads::recent_feedback_for_business(&self.pool, business_id, limit_to_i64(limit))
                .await?,
        )
    }

    async fn feedback_for_response(
        &self,
        response_id: i64,
    ) -> Result<Option<FeedbackKind>, StoreError> {
        Ok(leads::get_feedback_for_response(&self.pool, response_id).await?)
    }

    async fn insert_feedback_if_absent(
        &self,
        response_id: i64,
        kind: FeedbackKind,
    ) -> Result<bool, StoreError> {
        Ok(leads::insert_feedback_if_absent(&self.pool, response_id, kind).await?)
    }

    async fn create_business_with_campaign(
        &self,
        new: &NewBusiness,
    ) -> Result<Business, StoreError> {
        Ok(businesses::create_business_with_campaign(&self.pool, new).await?)
    }

    async fn delete_business(&self, business_id: i64) -> Result<bool, StoreError> {
        Ok(businesses::delete_business(&self.pool, business_id).await?)
    }

    async fn update_business_field(
        &self,
        business_id: i64,
        field: BusinessField,
        value: &str,
    ) -> Result<bool, StoreError> {
        Ok(businesses::update_business_field(&self.pool, business_id, field, value).await?)
    }
}
