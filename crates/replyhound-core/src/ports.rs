//! Collaborator interfaces: storage, messaging, AI model, and reply posting.
//!
//! Implementations live in `replyhound-db` (Postgres), `replyhound-ai`
//! (OpenAI-compatible model), `replyhound-sources` (Reddit poster),
//! `replyhound-server` (Telegram), and `replyhound-pipeline::memory`
//! (in-process stores for single-instance runs and tests).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{
    Business, BusinessContext, Campaign, FeedbackKind, MonitorTarget, NewBusiness, NewLead,
    Platform, ResponseStatus,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

/// Failure talking to a messaging transport or reply-posting API.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Failure from the AI collaborator, pre-classified for retry decisions.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("model rate limited: {0}")]
    RateLimited(String),

    #[error("model upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("model connection failed: {0}")]
    Connection(String),

    #[error("malformed model output: {0}")]
    Malformed(String),

    #[error("model returned empty output")]
    EmptyOutput,

    #[error("invalid model request: {0}")]
    InvalidRequest(String),
}

impl ModelError {
    /// Timeouts, 429/quota, 5xx, and connection failures are worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Timeout { .. }
            | ModelError::RateLimited(_)
            | ModelError::Connection(_) => true,
            ModelError::Upstream { status, .. } => *status >= 500,
            ModelError::Malformed(_) | ModelError::EmptyOutput | ModelError::InvalidRequest(_) => {
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Seen-item ledger
// ---------------------------------------------------------------------------

/// "Seen before" ledger.
///
/// Holds three key namespaces in one table:
/// - `"{source}::{identity}::{business_id}"`: per-business dedup keys.
/// - `"resp:{chunk}"`: fingerprint chunks of replies this system published.
/// - `"post:{response_id}"`: in-flight or completed direct posts.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Insert `key` unless present. Returns `true` when this call inserted it.
    async fn insert_if_absent(&self, key: &str, source: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// How many of `keys` are already present.
    async fn count_existing(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Drop a claim taken with [`SeenStore::insert_if_absent`].
    async fn release(&self, key: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Rate-limit buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Atomically increment the `(limiter, key)` bucket, starting a fresh
    /// window of length `window` when none exists or the stored one expired.
    async fn increment_or_insert(
        &self,
        limiter: &str,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<BucketState, StoreError>;

    /// Delete buckets whose window ended at or before `now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// Leads, responses, feedback, businesses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedLead {
    pub lead_id: i64,
    pub response_id: i64,
}

/// What the action handlers need to know about a generated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext {
    pub response_id: i64,
    pub lead_id: i64,
    pub business_id: i64,
    pub content: String,
    pub status: ResponseStatus,
    pub platform: Platform,
    pub post_url: Option<String>,
}

/// Editable business profile fields (admin wizard).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessField {
    Name,
    Offering,
    Contact,
    Location,
    Keywords,
}

impl BusinessField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            BusinessField::Name => "name",
            BusinessField::Offering => "offering",
            BusinessField::Contact => "contact",
            BusinessField::Location => "location",
            BusinessField::Keywords => "keywords",
        }
    }
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get_business(&self, business_id: i64) -> Result<Option<Business>, StoreError>;

    async fn list_businesses(&self) -> Result<Vec<Business>, StoreError>;

    async fn active_campaigns_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<Campaign>, StoreError>;

    /// Every active campaign on `platform`, paired with its business.
    async fn active_monitor_targets(
        &self,
        platform: Platform,
    ) -> Result<Vec<MonitorTarget>, StoreError>;

    /// Write the lead and its reply together, or neither.
    async fn persist_lead_with_response(
        &self,
        lead: &NewLead,
        content: &str,
    ) -> Result<PersistedLead, StoreError>;

    /// Move a response to `status`. Returns `false` when it already had it.
    async fn update_response_status(
        &self,
        response_id: i64,
        status: ResponseStatus,
    ) -> Result<bool, StoreError>;

    async fn response_context(
        &self,
        response_id: i64,
    ) -> Result<Option<ResponseContext>, StoreError>;

    /// The newest `limit` feedback rows for the business, oldest first.
    async fn recent_feedback(
        &self,
        business_id: i64,
        limit: usize,
    ) -> Result<Vec<FeedbackKind>, StoreError>;

    async fn feedback_for_response(
        &self,
        response_id: i64,
    ) -> Result<Option<FeedbackKind>, StoreError>;

    /// Returns `true` when this call recorded the feedback.
    async fn insert_feedback_if_absent(
        &self,
        response_id: i64,
        kind: FeedbackKind,
    ) -> Result<bool, StoreError>;

    async fn create_business_with_campaign(
        &self,
        new: &NewBusiness,
    ) -> Result<Business, StoreError>;

    /// Deletes the business and cascades to its campaigns, leads and replies.
    async fn delete_business(&self, business_id: i64) -> Result<bool, StoreError>;

    async fn update_business_field(
        &self,
        business_id: i64,
        field: BusinessField,
        value: &str,
    ) -> Result<bool, StoreError>;
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonKind {
    Url(String),
    Callback(String),
    /// Inert marker; tapping it does nothing.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub kind: ButtonKind,
}

impl Button {
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Url(url.into()),
        }
    }

    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Callback(data.into()),
        }
    }

    pub fn disabled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Disabled,
        }
    }
}

/// Rows of buttons, top to bottom.
pub type ButtonLayout = Vec<Vec<Button>>;

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a message and return the transport's message id.
    async fn send(
        &self,
        chat: &str,
        message: &str,
        buttons: &ButtonLayout,
    ) -> Result<String, DeliveryError>;

    async fn edit_buttons(
        &self,
        chat: &str,
        message_id: &str,
        buttons: &ButtonLayout,
    ) -> Result<(), DeliveryError>;

    /// Acknowledge a button tap with a short toast.
    async fn answer_action(&self, action_id: &str, toast: &str) -> Result<(), DeliveryError>;
}

/// Publishes a reply on the source platform. Returns the new comment's URL.
#[async_trait]
pub trait ReplyPoster: Send + Sync {
    async fn post_reply(&self, post_url: &str, text: &str) -> Result<String, DeliveryError>;
}

// ---------------------------------------------------------------------------
// AI model
// ---------------------------------------------------------------------------

/// A validated scoring result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentVerdict {
    pub is_lead: bool,
    /// Always within `1..=10`.
    pub intent_score: u8,
    pub reasoning: String,
}

#[async_trait]
pub trait LeadModel: Send + Sync {
    async fn score(
        &self,
        business: &BusinessContext,
        post: &str,
    ) -> Result<IntentVerdict, ModelError>;

    async fn generate(
        &self,
        business: &BusinessContext,
        post: &str,
        guidance: &str,
    ) -> Result<String, ModelError>;
}
