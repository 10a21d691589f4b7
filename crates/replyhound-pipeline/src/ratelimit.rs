//! Fixed-window rate limiter over a shared [`BucketStore`].
//!
//! Limiters are named (`scan`, `poll_reddit`, `poll_alerts`, `webhook`) and
//! each name has its own rule. Store failures allow the request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use replyhound_core::{AppConfig, BucketStore, StoreError};

pub const SCAN: &str = "scan";
pub const POLL_REDDIT: &str = "poll_reddit";
pub const POLL_ALERTS: &str = "poll_alerts";
pub const WEBHOOK: &str = "webhook";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl LimiterRule {
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    rules: HashMap<String, LimiterRule>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self {
            store,
            rules: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_rule(mut self, limiter: &str, rule: LimiterRule) -> Self {
        self.rules.insert(limiter.to_string(), rule);
        self
    }

    /// The four standard limiters, sized from configuration.
    #[must_use]
    pub fn from_app_config(store: Arc<dyn BucketStore>, config: &AppConfig) -> Self {
        let poll = LimiterRule::new(config.poll_rate_max, config.poll_rate_window_secs);
        Self::new(store)
            .with_rule(
                SCAN,
                LimiterRule::new(config.scan_rate_max, config.scan_rate_window_secs),
            )
            .with_rule(POLL_REDDIT, poll)
            .with_rule(POLL_ALERTS, poll)
            .with_rule(WEBHOOK, LimiterRule::new(120, 60))
    }

    /// Count one request against `(limiter, key)` and decide whether it may
    /// proceed. Unknown limiter names and store errors allow the request.
    pub async fn allow(&self, limiter: &str, key: &str, now: DateTime<Utc>) -> bool {
        let Some(rule) = self.rules.get(limiter) else {
            tracing::warn!(limiter, "ratelimit: no rule configured, allowing");
            return true;
        };

        match self
            .store
            .increment_or_insert(limiter, key, rule.window, now)
            .await
        {
            Ok(bucket) if bucket.count > rule.max_requests => {
                tracing::debug!(
                    limiter,
                    key,
                    count = bucket.count,
                    reset_at = %bucket.reset_at,
                    "ratelimit: denied"
                );
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    limiter,
                    key,
                    error = %e,
                    "ratelimit: store unavailable, failing open"
                );
                true
            }
        }
    }

    /// Delete buckets whose window has ended.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the bucket store.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.store.sweep_expired(now).await
    }
}
