//! In-process implementations of the storage ports.
//!
//! Used by single-instance deployments without Postgres and by tests. Each
//! store guards its state with one async mutex, so every operation is atomic
//! with respect to the others.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use replyhound_core::{
    BucketState, BucketStore, Business, BusinessField, ButtonLayout, Campaign, CampaignStatus,
    DeliveryError, FeedbackKind, LeadStore, Messenger, MonitorTarget, NewBusiness, NewLead,
    PersistedLead, Platform, ResponseContext, ResponseStatus, SeenStore, StoreError,
};
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// Seen items
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemorySeenStore {
    keys: Mutex<HashMap<String, String>>,
}

impl MemorySeenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn insert_if_absent(&self, key: &str, source: &str) -> Result<bool, StoreError> {
        let mut keys = self.keys.lock().await;
        if keys.contains_key(key) {
            return Ok(false);
        }
        keys.insert(key.to_string(), source.to_string());
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.keys.lock().await.contains_key(key))
    }

    async fn count_existing(&self, keys: &[String]) -> Result<usize, StoreError> {
        let stored = self.keys.lock().await;
        Ok(keys.iter().filter(|k| stored.contains_key(k.as_str())).count())
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        self.keys.lock().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rate-limit buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    buckets: Mutex<HashMap<(String, String), BucketState>>,
}

impl MemoryBucketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn increment_or_insert(
        &self,
        limiter: &str,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<BucketState, StoreError> {
        let window = chrono::Duration::from_std(window)
            .map_err(|e| StoreError::Corrupt(format!("window out of range: {e}")))?;
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry((limiter.to_string(), key.to_string()))
            .or_insert(BucketState {
                count: 0,
                reset_at: now + window,
            });
        if bucket.reset_at <= now {
            bucket.count = 0;
            bucket.reset_at = now + window;
        }
        bucket.count = bucket.count.saturating_add(1);
        Ok(*bucket)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, b| b.reset_at > now);
        Ok(u64::try_from(before - buckets.len()).unwrap_or(u64::MAX))
    }
}

// ---------------------------------------------------------------------------
// Leads, responses, feedback, businesses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLead {
    pub id: i64,
    pub lead: NewLead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub id: i64,
    pub lead_id: i64,
    pub content: String,
    pub status: ResponseStatus,
}

#[derive(Debug, Default)]
struct LeadState {
    next_id: i64,
    businesses: Vec<Business>,
    campaigns: Vec<Campaign>,
    leads: Vec<StoredLead>,
    responses: Vec<StoredResponse>,
    /// `(response_id, kind)` in insertion order.
    feedback: Vec<(i64, FeedbackKind)>,
}

impl LeadState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn lead_business(&self, response_id: i64) -> Option<i64> {
        let response = self.responses.iter().find(|r| r.id == response_id)?;
        self.leads
            .iter()
            .find(|l| l.id == response.lead_id)
            .map(|l| l.lead.business_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    state: Mutex<LeadState>,
}

impl MemoryLeadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn leads(&self) -> Vec<StoredLead> {
        self.state.lock().await.leads.clone()
    }

    pub async fn responses(&self) -> Vec<StoredResponse> {
        self.state.lock().await.responses.clone()
    }

    pub async fn feedback(&self) -> Vec<(i64, FeedbackKind)> {
        self.state.lock().await.feedback.clone()
    }

    /// Add a campaign to an existing business.
    pub async fn add_campaign(
        &self,
        business_id: i64,
        platform: Platform,
        keywords: Vec<String>,
        target_groups: Vec<String>,
    ) -> Campaign {
        let mut state = self.state.lock().await;
        let campaign = Campaign {
            id: state.next_id(),
            business_id,
            platform,
            status: CampaignStatus::Active,
            keywords,
            target_groups,
        };
        state.campaigns.push(campaign.clone());
        campaign
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn get_business(&self, business_id: i64) -> Result<Option<Business>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.businesses.iter().find(|b| b.id == business_id).cloned())
    }

    async fn list_businesses(&self) -> Result<Vec<Business>, StoreError> {
        let mut businesses = self.state.lock().await.businesses.clone();
        businesses.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(businesses)
    }

    async fn active_campaigns_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<Campaign>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .campaigns
            .iter()
            .filter(|c| c.business_id == business_id && c.status == CampaignStatus::Active)
            .cloned()
            .collect())
    }

    async fn active_monitor_targets(
        &self,
        platform: Platform,
    ) -> Result<Vec<MonitorTarget>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .campaigns
            .iter()
            .filter(|c| c.platform == platform && c.status == CampaignStatus::Active)
            .filter_map(|c| {
                let business = state.businesses.iter().find(|b| b.id == c.business_id)?;
                Some(MonitorTarget {
                    business: business.clone(),
                    campaign: c.clone(),
                })
            })
            .collect())
    }

    async fn persist_lead_with_response(
        &self,
        lead: &NewLead,
        content: &str,
    ) -> Result<PersistedLead, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::Corrupt("reply content is empty".to_string()));
        }
        if !(1..=10).contains(&lead.intent_score) {
            return Err(StoreError::Corrupt(format!(
                "intent score {} outside 1..=10",
                lead.intent_score
            )));
        }

        let mut state = self.state.lock().await;
        if !state.businesses.iter().any(|b| b.id == lead.business_id) {
            return Err(StoreError::NotFound(format!("business {}", lead.business_id)));
        }
        let lead_id = state.next_id();
        let response_id = state.next_id();
        state.leads.push(StoredLead {
            id: lead_id,
            lead: lead.clone(),
        });
        state.responses.push(StoredResponse {
            id: response_id,
            lead_id,
            content: content.to_string(),
            status: ResponseStatus::Pending,
        });
        Ok(PersistedLead {
            lead_id,
            response_id,
        })
    }

    async fn update_response_status(
        &self,
        response_id: i64,
        status: ResponseStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.responses.iter_mut().find(|r| r.id == response_id) {
            Some(response) if response.status != status => {
                response.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn response_context(
        &self,
        response_id: i64,
    ) -> Result<Option<ResponseContext>, StoreError> {
        let state = self.state.lock().await;
        let Some(response) = state.responses.iter().find(|r| r.id == response_id) else {
            return Ok(None);
        };
        let Some(lead) = state.leads.iter().find(|l| l.id == response.lead_id) else {
            return Ok(None);
        };
        Ok(Some(ResponseContext {
            response_id,
            lead_id: lead.id,
            business_id: lead.lead.business_id,
            content: response.content.clone(),
            status: response.status,
            platform: lead.lead.platform,
            post_url: lead.lead.post_url.clone(),
        }))
    }

    async fn recent_feedback(
        &self,
        business_id: i64,
        limit: usize,
    ) -> Result<Vec<FeedbackKind>, StoreError> {
        let state = self.state.lock().await;
        let for_business: Vec<FeedbackKind> = state
            .feedback
            .iter()
            .filter(|(response_id, _)| state.lead_business(*response_id) == Some(business_id))
            .map(|(_, kind)| *kind)
            .collect();
        let skip = for_business.len().saturating_sub(limit);
        Ok(for_business.into_iter().skip(skip).collect())
    }

    async fn feedback_for_response(
        &self,
        response_id: i64,
    ) -> Result<Option<FeedbackKind>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .feedback
            .iter()
            .find(|(id, _)| *id == response_id)
            .map(|(_, kind)| *kind))
    }

    async fn insert_feedback_if_absent(
        &self,
        response_id: i64,
        kind: FeedbackKind,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.responses.iter().any(|r| r.id == response_id) {
            return Err(StoreError::NotFound(format!("response {response_id}")));
        }
        if state.feedback.iter().any(|(id, _)| *id == response_id) {
            return Ok(false);
        }
        state.feedback.push((response_id, kind));
        Ok(true)
    }

    async fn create_business_with_campaign(
        &self,
        new: &NewBusiness,
    ) -> Result<Business, StoreError> {
        let mut state = self.state.lock().await;
        let name = new.name.trim();
        if state
            .businesses
            .iter()
            .any(|b| b.name.eq_ignore_ascii_case(name))
        {
            return Err(StoreError::Corrupt(format!("business {name} already exists")));
        }

        let business = Business {
            id: state.next_id(),
            name: name.to_string(),
            business_type: new.business_type.trim().to_string(),
            core_offering: new.core_offering.trim().to_string(),
            preferred_tone: new.preferred_tone,
            contact: new.contact.clone(),
            location: new.location.clone(),
        };
        state.businesses.push(business.clone());

        if let Some(platform) = new.platform {
            let campaign = Campaign {
                id: state.next_id(),
                business_id: business.id,
                platform,
                status: CampaignStatus::Active,
                keywords: new.keywords.clone(),
                target_groups: new.target_groups.clone(),
            };
            state.campaigns.push(campaign);
        }
        Ok(business)
    }

    async fn delete_business(&self, business_id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.businesses.len();
        state.businesses.retain(|b| b.id != business_id);
        if state.businesses.len() == before {
            return Ok(false);
        }

        state.campaigns.retain(|c| c.business_id != business_id);
        let lead_ids: Vec<i64> = state
            .leads
            .iter()
            .filter(|l| l.lead.business_id == business_id)
            .map(|l| l.id)
            .collect();
        state.leads.retain(|l| !lead_ids.contains(&l.id));
        let response_ids: Vec<i64> = state
            .responses
            .iter()
            .filter(|r| lead_ids.contains(&r.lead_id))
            .map(|r| r.id)
            .collect();
        state.responses.retain(|r| !response_ids.contains(&r.id));
        state.feedback.retain(|(id, _)| !response_ids.contains(id));
        Ok(true)
    }

    async fn update_business_field(
        &self,
        business_id: i64,
        field: BusinessField,
        value: &str,
    ) -> Result<bool, StoreError> {
        let value = value.trim();
        let mut state = self.state.lock().await;

        if field == BusinessField::Keywords {
            let keywords: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
            let mut changed = false;
            for campaign in state
                .campaigns
                .iter_mut()
                .filter(|c| c.business_id == business_id)
            {
                campaign.keywords.clone_from(&keywords);
                changed = true;
            }
            return Ok(changed);
        }

        let Some(business) = state.businesses.iter_mut().find(|b| b.id == business_id) else {
            return Ok(false);
        };
        match field {
            BusinessField::Name => business.name = value.to_string(),
            BusinessField::Offering => business.core_offering = value.to_string(),
            BusinessField::Contact => business.contact = Some(value.to_string()),
            BusinessField::Location => business.location = Some(value.to_string()),
            BusinessField::Keywords => {}
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub chat: String,
    pub text: String,
    pub buttons: ButtonLayout,
}

/// A [`Messenger`] that keeps every message and logs it instead of
/// delivering it. Used when no transport is configured.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    answers: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// `(action_id, toast)` pairs in answer order.
    pub async fn answers(&self) -> Vec<(String, String)> {
        self.answers.lock().await.clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(
        &self,
        chat: &str,
        message: &str,
        buttons: &ButtonLayout,
    ) -> Result<String, DeliveryError> {
        let mut sent = self.sent.lock().await;
        let id = (sent.len() + 1).to_string();
        tracing::info!(chat, message_id = %id, "messenger: {message}");
        sent.push(SentMessage {
            id: id.clone(),
            chat: chat.to_string(),
            text: message.to_string(),
            buttons: buttons.clone(),
        });
        Ok(id)
    }

    async fn edit_buttons(
        &self,
        chat: &str,
        message_id: &str,
        buttons: &ButtonLayout,
    ) -> Result<(), DeliveryError> {
        let mut sent = self.sent.lock().await;
        let message = sent
            .iter_mut()
            .find(|m| m.chat == chat && m.id == message_id)
            .ok_or_else(|| DeliveryError(format!("no message {message_id} in {chat}")))?;
        message.buttons = buttons.clone();
        Ok(())
    }

    async fn answer_action(&self, action_id: &str, toast: &str) -> Result<(), DeliveryError> {
        self.answers
            .lock()
            .await
            .push((action_id.to_string(), toast.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn seen_insert_is_idempotent() {
        let store = MemorySeenStore::new();
        assert!(store.insert_if_absent("k", "reddit").await.unwrap());
        assert!(!store.insert_if_absent("k", "reddit").await.unwrap());
        assert!(store.exists("k").await.unwrap());
        assert_eq!(
            store
                .count_existing(&["k".to_string(), "other".to_string()])
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn bucket_window_resets_after_expiry() {
        let store = MemoryBucketStore::new();
        let window = Duration::from_secs(60);
        let first = store.increment_or_insert("scan", "c1", window, t(0)).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.reset_at, t(60));
        let second = store.increment_or_insert("scan", "c1", window, t(30)).await.unwrap();
        assert_eq!(second.count, 2);
        let fresh = store.increment_or_insert("scan", "c1", window, t(60)).await.unwrap();
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.reset_at, t(120));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_buckets() {
        let store = MemoryBucketStore::new();
        store
            .increment_or_insert("scan", "old", Duration::from_secs(10), t(0))
            .await
            .unwrap();
        store
            .increment_or_insert("scan", "new", Duration::from_secs(100), t(0))
            .await
            .unwrap();
        assert_eq!(store.sweep_expired(t(50)).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn empty_reply_persists_nothing() {
        let store = MemoryLeadStore::new();
        let business = store
            .create_business_with_campaign(&NewBusiness {
                name: "Acme".into(),
                core_offering: "Widgets for everyone".into(),
                ..NewBusiness::default()
            })
            .await
            .unwrap();
        let lead = NewLead {
            business_id: business.id,
            campaign_id: None,
            platform: Platform::Reddit,
            group_name: None,
            author_name: None,
            original_post: "post".into(),
            post_url: None,
            intent_score: 8,
        };
        assert!(store.persist_lead_with_response(&lead, "  ").await.is_err());
        assert!(store.leads().await.is_empty());
        assert!(store.responses().await.is_empty());
    }
}
