//! Candidate evaluation: self-echo check, dedup claim, keyword gate, AI
//! scoring and generation, atomic persistence, notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use replyhound_ai::{call_with_policy, CallPolicy};
use replyhound_core::{
    AppConfig, BusinessContext, Campaign, IntentVerdict, LeadModel, LeadStore, ModelError,
    MonitorTarget, NewLead, Platform, PostCandidate,
};

use crate::dispatch::{Dispatcher, LeadNotice};
use crate::error::PipelineError;
use crate::gate::{self, EmptyKeywordPolicy};
use crate::guidance::guidance_for;
use crate::ledger::{content_identity, dedup_key, Ledger};

/// How a candidate entered the pipeline. Manual scans use a lower bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPath {
    Automated,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub automated: u8,
    pub manual: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            automated: 7,
            manual: 5,
        }
    }
}

impl Thresholds {
    #[must_use]
    pub const fn for_path(self, path: EntryPath) -> u8 {
        match path {
            EntryPath::Automated => self.automated,
            EntryPath::Manual => self.manual,
        }
    }

    #[must_use]
    pub fn qualifies(self, verdict: &IntentVerdict, path: EntryPath) -> bool {
        verdict.is_lead && verdict.intent_score >= self.for_path(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub thresholds: Thresholds,
    pub feedback_window: usize,
    pub call_policy: CallPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            feedback_window: 20,
            call_policy: CallPolicy::default(),
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            thresholds: Thresholds {
                automated: config.auto_min_intent,
                manual: config.manual_min_intent,
            },
            feedback_window: config.feedback_window,
            call_policy: CallPolicy::from_app_config(config),
        }
    }
}

/// Per-call options. The empty-keyword policy is always stated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateOptions {
    pub path: EntryPath,
    pub empty_keywords: EmptyKeywordPolicy,
    /// Chat to notify about a persisted lead. `None` skips notification.
    pub notify_chat: Option<String>,
}

impl EvaluateOptions {
    /// Background monitors: the target group already narrows the feed.
    #[must_use]
    pub fn automated(notify_chat: Option<String>) -> Self {
        Self {
            path: EntryPath::Automated,
            empty_keywords: EmptyKeywordPolicy::MatchAll,
            notify_chat,
        }
    }

    /// Bookmarklet and screenshot scans.
    #[must_use]
    pub fn manual(notify_chat: Option<String>) -> Self {
        Self {
            path: EntryPath::Manual,
            empty_keywords: EmptyKeywordPolicy::MatchNone,
            notify_chat,
        }
    }
}

/// Result of evaluating one candidate. Short-circuits are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SelfEcho,
    Duplicate,
    NoKeywordMatch,
    Rejected {
        verdict: IntentVerdict,
        threshold: u8,
    },
    Dropped {
        reason: String,
    },
    Persisted {
        lead_id: i64,
        response_id: i64,
        verdict: IntentVerdict,
        reply: String,
        notified: bool,
    },
}

impl Outcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Outcome::SelfEcho => "self_echo",
            Outcome::Duplicate => "duplicate",
            Outcome::NoKeywordMatch => "no_keyword_match",
            Outcome::Rejected { .. } => "rejected",
            Outcome::Dropped { .. } => "dropped",
            Outcome::Persisted { .. } => "persisted",
        }
    }
}

/// Per-outcome counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub evaluated: usize,
    pub persisted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub errors: usize,
}

impl std::ops::AddAssign for BatchSummary {
    fn add_assign(&mut self, other: Self) {
        self.evaluated += other.evaluated;
        self.persisted += other.persisted;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
        self.dropped += other.dropped;
        self.errors += other.errors;
    }
}

pub struct Pipeline {
    ledger: Ledger,
    store: Arc<dyn LeadStore>,
    model: Arc<dyn LeadModel>,
    settings: PipelineSettings,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        ledger: Ledger,
        store: Arc<dyn LeadStore>,
        model: Arc<dyn LeadModel>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            ledger,
            store,
            model,
            settings,
            dispatcher: None,
        }
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    /// Evaluate one candidate for one business/campaign.
    ///
    /// Model failures end in [`Outcome::Dropped`]; the dedup claim stays, so
    /// the candidate is never retried indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the ledger or the lead store fail.
    pub async fn evaluate(
        &self,
        target: &MonitorTarget,
        candidate: &PostCandidate,
        options: &EvaluateOptions,
        now: DateTime<Utc>,
    ) -> Result<Outcome, PipelineError> {
        let business_id = target.business.id;
        let text = candidate.text();

        if self.ledger.is_self_echo(&text).await? {
            tracing::debug!(
                business_id,
                source = %candidate.source,
                "pipeline: self-echo skipped"
            );
            return Ok(Outcome::SelfEcho);
        }

        let key = dedup_key(candidate.source, &content_identity(candidate), business_id);
        if !self
            .ledger
            .mark_seen(&key, candidate.source.as_str())
            .await?
        {
            tracing::debug!(business_id, key = %key, "pipeline: duplicate skipped");
            return Ok(Outcome::Duplicate);
        }

        if !gate::matches(&text, &target.campaign.keywords, options.empty_keywords) {
            tracing::debug!(
                business_id,
                campaign_id = target.campaign.id,
                "pipeline: no keyword match"
            );
            return Ok(Outcome::NoKeywordMatch);
        }

        let ctx = BusinessContext::new(&target.business, target.campaign.platform);
        let verdict = match self.score(&ctx, &text).await {
            Ok(verdict) => verdict,
            Err(e) => return Ok(dropped(business_id, "score", &e)),
        };

        let threshold = self.settings.thresholds.for_path(options.path);
        if !self.settings.thresholds.qualifies(&verdict, options.path) {
            tracing::debug!(
                business_id,
                is_lead = verdict.is_lead,
                score = verdict.intent_score,
                threshold,
                "pipeline: below threshold"
            );
            return Ok(Outcome::Rejected { verdict, threshold });
        }

        let guidance =
            guidance_for(self.store.as_ref(), business_id, self.settings.feedback_window).await?;
        let reply = match self.generate(&ctx, &text, &guidance).await {
            Ok(reply) => reply,
            Err(e) => return Ok(dropped(business_id, "generate", &e)),
        };

        let lead = NewLead::from_candidate(target, candidate, verdict.intent_score);
        let persisted = self.store.persist_lead_with_response(&lead, &reply).await?;
        tracing::info!(
            business_id,
            campaign_id = ?lead.campaign_id,
            lead_id = persisted.lead_id,
            response_id = persisted.response_id,
            score = verdict.intent_score,
            source = %candidate.source,
            "pipeline: lead persisted"
        );

        let notified = match (&self.dispatcher, options.notify_chat.as_deref()) {
            (Some(dispatcher), Some(chat)) => {
                let notice = LeadNotice {
                    business: &target.business,
                    platform: target.campaign.platform,
                    candidate,
                    verdict: &verdict,
                    reply: Some(&reply),
                    response_id: persisted.response_id,
                };
                match dispatcher.notify(chat, &notice, now).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(
                            business_id,
                            response_id = persisted.response_id,
                            error = %e,
                            "pipeline: notification failed"
                        );
                        false
                    }
                }
            }
            _ => false,
        };

        Ok(Outcome::Persisted {
            lead_id: persisted.lead_id,
            response_id: persisted.response_id,
            verdict,
            reply,
            notified,
        })
    }

    /// Evaluate candidates one after another. Store errors are counted and
    /// logged; they do not stop the batch.
    pub async fn run_batch(
        &self,
        target: &MonitorTarget,
        candidates: &[PostCandidate],
        options: &EvaluateOptions,
        now: DateTime<Utc>,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for candidate in candidates {
            summary.evaluated += 1;
            match self.evaluate(target, candidate, options, now).await {
                Ok(Outcome::Persisted { .. }) => summary.persisted += 1,
                Ok(Outcome::Rejected { .. }) => summary.rejected += 1,
                Ok(Outcome::Dropped { .. }) => summary.dropped += 1,
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    summary.errors += 1;
                    tracing::warn!(
                        business_id = target.business.id,
                        campaign_id = target.campaign.id,
                        error = %e,
                        "pipeline: candidate failed"
                    );
                }
            }
        }
        summary
    }

    /// Resolve the business/campaign a manual scan is evaluated against.
    ///
    /// The platform comes from the page URL. Keywords are the union of the
    /// business's active campaigns, so a business without a campaign on that
    /// platform still gets gated by what it monitors elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] for an unknown business.
    pub async fn manual_target(
        &self,
        business_id: i64,
        page_url: Option<&str>,
    ) -> Result<MonitorTarget, PipelineError> {
        let business = self
            .store
            .get_business(business_id)
            .await?
            .ok_or_else(|| PipelineError::InvalidInput(format!("unknown business {business_id}")))?;
        let platform = platform_for_url(page_url);
        let campaigns = self.store.active_campaigns_for_business(business_id).await?;

        let mut keywords: Vec<String> = Vec::new();
        for kw in campaigns.iter().flat_map(|c| c.keywords.iter()) {
            if !keywords.iter().any(|k| k.eq_ignore_ascii_case(kw)) {
                keywords.push(kw.clone());
            }
        }

        let mut campaign = campaigns
            .into_iter()
            .find(|c| c.platform == platform)
            .unwrap_or_else(|| Campaign::ad_hoc(business_id, platform));
        campaign.keywords = keywords;

        Ok(MonitorTarget { business, campaign })
    }

    async fn score(&self, ctx: &BusinessContext, text: &str) -> Result<IntentVerdict, ModelError> {
        let policy = self.settings.call_policy;
        let mut retried_malformed = false;
        loop {
            match call_with_policy(policy, "score", || self.model.score(ctx, text)).await {
                Err(ModelError::Malformed(reason)) if !retried_malformed => {
                    tracing::debug!(reason = %reason, "pipeline: malformed verdict, retrying once");
                    retried_malformed = true;
                }
                other => return other,
            }
        }
    }

    async fn generate(
        &self,
        ctx: &BusinessContext,
        text: &str,
        guidance: &str,
    ) -> Result<String, ModelError> {
        let reply = call_with_policy(self.settings.call_policy, "generate", || {
            self.model.generate(ctx, text, guidance)
        })
        .await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ModelError::EmptyOutput);
        }
        Ok(reply.to_string())
    }
}

fn dropped(business_id: i64, stage: &str, err: &ModelError) -> Outcome {
    tracing::warn!(business_id, stage, error = %err, "pipeline: candidate dropped");
    Outcome::Dropped {
        reason: format!("{stage}: {err}"),
    }
}

/// Platform a scanned page belongs to. Unknown hosts are treated as
/// community pages, the stricter reply rules.
#[must_use]
pub fn platform_for_url(page_url: Option<&str>) -> Platform {
    let host = page_url
        .and_then(|u| u.split("://").nth(1))
        .and_then(|rest| rest.split(['/', '?', '#']).next())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let is = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if is("reddit.com") {
        Platform::Reddit
    } else if is("linkedin.com") {
        Platform::Linkedin
    } else {
        Platform::Facebook
    }
}
