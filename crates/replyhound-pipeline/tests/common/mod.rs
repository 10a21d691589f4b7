//! Shared fakes for the pipeline integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use replyhound_ai::CallPolicy;
use replyhound_core::{
    Business, BusinessContext, BusinessField, Campaign, DeliveryError, FeedbackKind,
    IntentVerdict, LeadModel, LeadStore, ModelError, MonitorTarget, NewBusiness, NewLead,
    PersistedLead, Platform, PostCandidate, ReplyPoster, ResponseContext, ResponseStatus,
    SourceKind, StoreError,
};
use replyhound_pipeline::memory::{MemoryLeadStore, MemorySeenStore, RecordingMessenger};
use replyhound_pipeline::{Dispatcher, Ledger, Pipeline, PipelineSettings};

pub const REPLY: &str = "We did an indoor bocce league for our team last spring and it was a \
hit, low pressure and everyone could play. Worth calling a couple of venues to ask about \
private lanes for groups.";

pub const POST_TTL: Duration = Duration::from_secs(900);

pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn verdict(score: u8) -> IntentVerdict {
    IntentVerdict {
        is_lead: true,
        intent_score: score,
        reasoning: "Asking for team-building venues".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Replays queued results; falls back to a score of 8 and [`REPLY`].
#[derive(Default)]
pub struct ScriptedModel {
    scores: Mutex<VecDeque<Result<IntentVerdict, ModelError>>>,
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    guidance: Mutex<Vec<String>>,
    pub score_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(self, result: Result<IntentVerdict, ModelError>) -> Self {
        self.scores.lock().unwrap().push_back(result);
        self
    }

    pub fn reply(self, result: Result<String, ModelError>) -> Self {
        self.replies.lock().unwrap().push_back(result);
        self
    }

    pub fn scores_called(&self) -> usize {
        self.score_calls.load(Ordering::SeqCst)
    }

    pub fn generates_called(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn guidance_seen(&self) -> Vec<String> {
        self.guidance.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeadModel for ScriptedModel {
    async fn score(
        &self,
        _business: &BusinessContext,
        _post: &str,
    ) -> Result<IntentVerdict, ModelError> {
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.scores.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(verdict(8)))
    }

    async fn generate(
        &self,
        _business: &BusinessContext,
        _post: &str,
        guidance: &str,
    ) -> Result<String, ModelError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.guidance.lock().unwrap().push(guidance.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(REPLY.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Poster
// ---------------------------------------------------------------------------

/// Records posts. The first `failures` calls fail.
#[derive(Default)]
pub struct FakePoster {
    failures: AtomicUsize,
    posts: Mutex<Vec<(String, String)>>,
}

impl FakePoster {
    pub fn failing() -> Self {
        Self::failing_times(usize::MAX)
    }

    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyPoster for FakePoster {
    async fn post_reply(&self, post_url: &str, text: &str) -> Result<String, DeliveryError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DeliveryError("403 Forbidden".to_string()));
        }
        tokio::task::yield_now().await;
        let mut posts = self.posts.lock().unwrap();
        posts.push((post_url.to_string(), text.to_string()));
        Ok(format!("{post_url}reply{}/", posts.len()))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryLeadStore`] but every status update fails.
pub struct StatusOutageStore(pub Arc<MemoryLeadStore>);

#[async_trait]
impl LeadStore for StatusOutageStore {
    async fn get_business(&self, business_id: i64) -> Result<Option<Business>, StoreError> {
        self.0.get_business(business_id).await
    }

    async fn list_businesses(&self) -> Result<Vec<Business>, StoreError> {
        self.0.list_businesses().await
    }

    async fn active_campaigns_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<Campaign>, StoreError> {
        self.0.active_campaigns_for_business(business_id).await
    }

    async fn active_monitor_targets(
        &self,
        platform: Platform,
    ) -> Result<Vec<MonitorTarget>, StoreError> {
        self.0.active_monitor_targets(platform).await
    }

    async fn persist_lead_with_response(
        &self,
        lead: &NewLead,
        content: &str,
    ) -> Result<PersistedLead, StoreError> {
        self.0.persist_lead_with_response(lead, content).await
    }

    async fn update_response_status(
        &self,
        _response_id: i64,
        _status: ResponseStatus,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn response_context(
        &self,
        response_id: i64,
    ) -> Result<Option<ResponseContext>, StoreError> {
        self.0.response_context(response_id).await
    }

    async fn recent_feedback(
        &self,
        business_id: i64,
        limit: usize,
    ) -> Result<Vec<FeedbackKind>, StoreError> {
        self.0.recent_feedback(business_id, limit).await
    }

    async fn feedback_for_response(
        &self,
        response_id: i64,
    ) -> Result<Option<FeedbackKind>, StoreError> {
        self.0.feedback_for_response(response_id).await
    }

    async fn insert_feedback_if_absent(
        &self,
        response_id: i64,
        kind: FeedbackKind,
    ) -> Result<bool, StoreError> {
        self.0.insert_feedback_if_absent(response_id, kind).await
    }

    async fn create_business_with_campaign(
        &self,
        new: &NewBusiness,
    ) -> Result<Business, StoreError> {
        self.0.create_business_with_campaign(new).await
    }

    async fn delete_business(&self, business_id: i64) -> Result<bool, StoreError> {
        self.0.delete_business(business_id).await
    }

    async fn update_business_field(
        &self,
        business_id: i64,
        field: BusinessField,
        value: &str,
    ) -> Result<bool, StoreError> {
        self.0.update_business_field(business_id, field, value).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryLeadStore>,
    pub seen: Arc<MemorySeenStore>,
    pub messenger: Arc<RecordingMessenger>,
    pub model: Arc<ScriptedModel>,
    pub dispatcher: Arc<Dispatcher>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new(model: ScriptedModel) -> Self {
        Self::build(model, None)
    }

    pub fn with_poster(model: ScriptedModel, poster: Arc<FakePoster>) -> Self {
        Self::build(model, Some(poster))
    }

    fn build(model: ScriptedModel, poster: Option<Arc<FakePoster>>) -> Self {
        let store = Arc::new(MemoryLeadStore::new());
        let seen = Arc::new(MemorySeenStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let model = Arc::new(model);
        let ledger = Ledger::new(seen.clone(), 2);

        let mut dispatcher =
            Dispatcher::new(messenger.clone(), store.clone(), ledger.clone(), POST_TTL);
        if let Some(poster) = poster {
            dispatcher = dispatcher.with_poster(poster);
        }
        let dispatcher = Arc::new(dispatcher);

        let settings = PipelineSettings {
            call_policy: CallPolicy {
                timeout: Duration::from_secs(2),
                max_retries: 2,
                backoff_base_ms: 1,
            },
            ..PipelineSettings::default()
        };
        let pipeline = Pipeline::new(ledger, store.clone(), model.clone(), settings)
            .with_dispatcher(dispatcher.clone());

        Self {
            store,
            seen,
            messenger,
            model,
            dispatcher,
            pipeline,
        }
    }

    /// A business with one active campaign on `platform` watching `keywords`.
    pub async fn business(
        &self,
        name: &str,
        platform: Platform,
        keywords: &[&str],
    ) -> MonitorTarget {
        let business = self
            .store
            .create_business_with_campaign(&NewBusiness {
                name: name.to_string(),
                business_type: "entertainment venue".to_string(),
                core_offering: "Indoor bocce courts and private event space".to_string(),
                platform: Some(platform),
                keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
                ..NewBusiness::default()
            })
            .await
            .unwrap();
        self.store
            .active_monitor_targets(platform)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.business.id == business.id)
            .unwrap()
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

pub fn bocce_post() -> PostCandidate {
    PostCandidate {
        source: SourceKind::Bookmarklet,
        source_id: None,
        title: String::new(),
        body: "Any fun team-building spots near Chicago? We tried bocce once".to_string(),
        link: Some("https://www.facebook.com/groups/chicagoevents/posts/1234".to_string()),
        group_name: Some("Chicago Events".to_string()),
        author_name: Some("Dana".to_string()),
        age_hint: Some("2h".to_string()),
    }
}

pub fn reddit_post(id: &str, title: &str) -> PostCandidate {
    PostCandidate {
        source: SourceKind::Reddit,
        source_id: Some(format!("t3_{id}")),
        title: title.to_string(),
        body: "We tried bocce once and loved it.".to_string(),
        link: Some(format!("https://www.reddit.com/r/chicago/comments/{id}/post/")),
        group_name: Some("r/chicago".to_string()),
        author_name: Some("teamlead".to_string()),
        age_hint: Some("1h".to_string()),
    }
}

/// A post whose body is a reply we published earlier.
pub fn echo_of(reply: &str) -> PostCandidate {
    PostCandidate {
        source: SourceKind::Reddit,
        source_id: Some("t1_echo".to_string()),
        title: String::new(),
        body: reply.to_string(),
        link: Some("https://www.reddit.com/r/chicago/comments/abc123/post/echo/".to_string()),
        group_name: Some("r/chicago".to_string()),
        author_name: Some("replyhound_bot".to_string()),
        age_hint: None,
    }
}
