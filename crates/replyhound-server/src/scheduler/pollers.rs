//! Source pollers: one tick fetches every target group of every active
//! campaign on the poller's platform and runs the batch through the pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use replyhound_core::{Platform, PostCandidate};
use replyhound_pipeline::{ratelimit, BatchSummary, EvaluateOptions};
use replyhound_sources::{AlertsClient, RedditClient, SourceError};
use tokio::sync::Mutex;

use crate::state::AppState;

/// Poll-tick limiter key. The budget is shared by every tick of a poller.
const GLOBAL_KEY: &str = "global";

#[async_trait]
pub trait FeedSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn platform(&self) -> Platform;

    /// Rate limiter consulted before each tick.
    fn limiter(&self) -> &'static str;

    /// Fetch candidates for one target group (a subreddit or a feed URL).
    async fn fetch(&self, group: &str) -> Result<Vec<PostCandidate>, SourceError>;
}

#[async_trait]
impl FeedSource for RedditClient {
    fn name(&self) -> &'static str {
        "reddit"
    }

    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    fn limiter(&self) -> &'static str {
        ratelimit::POLL_REDDIT
    }

    async fn fetch(&self, group: &str) -> Result<Vec<PostCandidate>, SourceError> {
        self.fetch_new(group, None).await
    }
}

#[async_trait]
impl FeedSource for AlertsClient {
    fn name(&self) -> &'static str {
        "alerts"
    }

    fn platform(&self) -> Platform {
        Platform::GoogleAlerts
    }

    fn limiter(&self) -> &'static str {
        ratelimit::POLL_ALERTS
    }

    async fn fetch(&self, group: &str) -> Result<Vec<PostCandidate>, SourceError> {
        AlertsClient::fetch(self, group).await
    }
}

pub struct Poller {
    source: Arc<dyn FeedSource>,
    state: AppState,
    inter_target_delay: Duration,
    running: Mutex<()>,
}

impl Poller {
    #[must_use]
    pub fn new(source: Arc<dyn FeedSource>, state: AppState, inter_target_delay: Duration) -> Self {
        Self {
            source,
            state,
            inter_target_delay,
            running: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.source.name()
    }

    /// Run one poll cycle. Returns `None` when the tick was skipped: a
    /// previous cycle is still running, the limiter denied it, or the
    /// targets could not be loaded.
    pub async fn tick(&self) -> Option<BatchSummary> {
        let source = self.source.name();
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!(source, "scheduler: previous poll still running, skipping tick");
            return None;
        };

        if !self
            .state
            .limiter
            .allow(self.source.limiter(), GLOBAL_KEY, Utc::now())
            .await
        {
            tracing::debug!(source, "scheduler: poll rate limited, skipping tick");
            return None;
        }

        let targets = match self
            .state
            .store
            .active_monitor_targets(self.source.platform())
            .await
        {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!(source, error = %e, "scheduler: failed to load targets");
                return None;
            }
        };

        let options = EvaluateOptions::automated(self.state.operator_chat.clone());
        let mut total = BatchSummary::default();
        let mut fetches = 0_usize;

        for target in &targets {
            if target.campaign.target_groups.is_empty() {
                tracing::debug!(
                    source,
                    campaign_id = target.campaign.id,
                    "scheduler: campaign has no target groups"
                );
            }
            for group in &target.campaign.target_groups {
                if fetches > 0 {
                    tokio::time::sleep(self.inter_target_delay).await;
                }
                fetches += 1;

                let candidates = match self.source.fetch(group).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        tracing::warn!(
                            source,
                            group = %group,
                            error = %e,
                            "scheduler: fetch failed"
                        );
                        continue;
                    }
                };
                total += self
                    .state
                    .pipeline
                    .run_batch(target, &candidates, &options, Utc::now())
                    .await;
            }
        }

        tracing::info!(
            source,
            targets = targets.len(),
            evaluated = total.evaluated,
            persisted = total.persisted,
            rejected = total.rejected,
            skipped = total.skipped,
            dropped = total.dropped,
            errors = total.errors,
            "scheduler: poll complete"
        );
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use replyhound_core::{NewBusiness, SourceKind};
    use replyhound_pipeline::memory::RecordingMessenger;

    use super::*;
    use crate::test_support::{config, state_with};

    struct FakeFeed {
        calls: AtomicUsize,
        fail_group: Option<&'static str>,
    }

    impl FakeFeed {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_group: None,
            }
        }
    }

    #[async_trait]
    impl FeedSource for FakeFeed {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn platform(&self) -> Platform {
            Platform::Reddit
        }

        fn limiter(&self) -> &'static str {
            ratelimit::POLL_REDDIT
        }

        async fn fetch(&self, group: &str) -> Result<Vec<PostCandidate>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_group == Some(group) {
                return Err(SourceError::Reddit("status 503".to_string()));
            }
            Ok(vec![PostCandidate {
                source: SourceKind::Reddit,
                source_id: Some(format!("t3_{group}")),
                title: format!("Team-building ideas in {group}?"),
                body: "Planning an offsite for 30 people, any suggestions?".to_string(),
                link: Some(format!("https://www.reddit.com/r/{group}/comments/abc/")),
                group_name: Some(group.to_string()),
                author_name: Some("planner".to_string()),
                age_hint: Some("5m ago".to_string()),
            }])
        }
    }

    async fn reddit_business(state: &AppState, groups: &[&str]) {
        state
            .store
            .create_business_with_campaign(&NewBusiness {
                name: "Bocce Social".to_string(),
                business_type: "bocce venue".to_string(),
                core_offering: "Indoor bocce for team events".to_string(),
                platform: Some(Platform::Reddit),
                keywords: vec!["team-building".to_string()],
                target_groups: groups.iter().map(ToString::to_string).collect(),
                ..NewBusiness::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tick_evaluates_every_target_group_and_notifies_operator() {
        let messenger = Arc::new(RecordingMessenger::new());
        let state = state_with(&config(&[("TELEGRAM_CHAT_ID", "99")]), messenger.clone());
        reddit_business(&state, &["chicago", "eventplanning"]).await;

        let feed = Arc::new(FakeFeed::new());
        let poller = Poller::new(feed.clone(), state, Duration::ZERO);
        let summary = poller.tick().await.unwrap();

        assert_eq!(feed.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.persisted, 2);
        let sent = messenger.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.chat == "99"));
    }

    #[tokio::test]
    async fn repeated_tick_skips_already_seen_posts() {
        let messenger = Arc::new(RecordingMessenger::new());
        let state = state_with(&config(&[]), messenger);
        reddit_business(&state, &["chicago"]).await;

        let poller = Poller::new(Arc::new(FakeFeed::new()), state, Duration::ZERO);
        assert_eq!(poller.tick().await.unwrap().persisted, 1);
        let second = poller.tick().await.unwrap();
        assert_eq!(second.persisted, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn failed_fetch_does_not_abort_the_cycle() {
        let messenger = Arc::new(RecordingMessenger::new());
        let state = state_with(&config(&[]), messenger);
        reddit_business(&state, &["broken", "chicago"]).await;

        let feed = Arc::new(FakeFeed {
            calls: AtomicUsize::new(0),
            fail_group: Some("broken"),
        });
        let poller = Poller::new(feed.clone(), state, Duration::ZERO);
        let summary = poller.tick().await.unwrap();
        assert_eq!(feed.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.persisted, 1);
    }

    #[tokio::test]
    async fn rate_limited_tick_is_skipped() {
        let messenger = Arc::new(RecordingMessenger::new());
        let state = state_with(&config(&[("REPLYHOUND_POLL_RATE_MAX", "1")]), messenger);
        reddit_business(&state, &["chicago"]).await;

        let feed = Arc::new(FakeFeed::new());
        let poller = Poller::new(feed.clone(), state, Duration::ZERO);
        assert!(poller.tick().await.is_some());
        assert!(poller.tick().await.is_none());
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let messenger = Arc::new(RecordingMessenger::new());
        let state = state_with(&config(&[]), messenger);
        let poller = Poller::new(Arc::new(FakeFeed::new()), state, Duration::ZERO);

        let _held = poller.running.lock().await;
        assert!(poller.tick().await.is_none());
    }
}
