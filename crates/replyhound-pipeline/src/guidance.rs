//! Generation guidance derived from recent operator feedback.

use replyhound_core::{FeedbackKind, LeadStore, StoreError};

pub const SUBTLE_DIRECTIVE: &str = "Recent replies were flagged as too salesy. Be extremely \
subtle: lead with genuinely useful advice, do not pitch, and only reference the business if \
it is unmistakably what the person asked for.";

pub const GENUINE_DIRECTIVE: &str = "Recent replies missed the mark. Sound more genuine: \
answer the person's actual question in plain language, like a helpful peer would.";

const SALESY_RATIO_LIMIT: f64 = 0.3;
const NEGATIVE_RATIO_LIMIT: f64 = 0.5;

/// Directive for a feedback window (oldest first). Empty means no adjustment.
#[must_use]
pub fn guidance_from(feedback: &[FeedbackKind]) -> &'static str {
    if feedback.is_empty() {
        return "";
    }

    #[allow(clippy::cast_precision_loss)]
    let total = feedback.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let ratio = |pred: fn(&FeedbackKind) -> bool| {
        feedback.iter().filter(|k| pred(k)).count() as f64 / total
    };

    if ratio(|k| *k == FeedbackKind::TooSalesy) > SALESY_RATIO_LIMIT {
        SUBTLE_DIRECTIVE
    } else if ratio(|k| *k != FeedbackKind::Positive) > NEGATIVE_RATIO_LIMIT {
        GENUINE_DIRECTIVE
    } else {
        ""
    }
}

/// Guidance for `business_id` from its newest `window` feedback rows.
///
/// # Errors
///
/// Propagates [`StoreError`] from the lead store.
pub async fn guidance_for(
    store: &dyn LeadStore,
    business_id: i64,
    window: usize,
) -> Result<String, StoreError> {
    let feedback = store.recent_feedback(business_id, window).await?;
    Ok(guidance_from(&feedback).to_string())
}
