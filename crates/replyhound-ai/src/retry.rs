//! Timeout and exponential back-off for model calls.
//!
//! [`call_with_policy`] races every attempt against [`CallPolicy::timeout`]
//! and retries transient failures ([`ModelError::is_transient`]). Anything
//! else is returned after the first attempt.

use std::future::Future;
use std::time::Duration;

use replyhound_core::{AppConfig, ModelError};

const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff_base_ms: 1_000,
        }
    }
}

impl CallPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.ai_timeout_secs),
            max_retries: config.ai_max_retries,
            backoff_base_ms: config.ai_retry_backoff_base_ms,
        }
    }

    /// Sleep before retry number `attempt` (1-based): `base × 2^(attempt-1)`,
    /// capped at 60 s, with ±25 % jitter.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let capped = self
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(MAX_DELAY_MS);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// Run `operation` under `policy`. `label` names the call in logs.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-transient error. A timed-out attempt is [`ModelError::Timeout`].
pub async fn call_with_policy<T, F, Fut>(
    policy: CallPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout {
                after_ms: u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = policy.backoff_delay(attempt);
                tracing::warn!(
                    call = label,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "model call failed, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
