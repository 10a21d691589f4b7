//! Manual scans from the bookmarklet and the screenshot extractor.
//!
//! Each request carries a scan token bound to `(chat_id, business_id)`. A
//! qualifying post is notified to that chat.

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use replyhound_core::PostCandidate;
use replyhound_pipeline::{ratelimit, EvaluateOptions, Outcome};
use replyhound_sources::{from_bookmarklet, from_screenshot, ManualPost, OcrExtraction, SourceError};
use serde::{Deserialize, Deserializer, Serialize};

use super::{map_pipeline_error, ApiError};
use crate::middleware::RequestId;
use crate::state::AppState;

/// Telegram chat ids arrive as numbers or strings depending on the caller.
fn chat_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.trim().to_string(),
        Raw::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(deserialize_with = "chat_id")]
    pub chat_id: String,
    pub business_id: i64,
    pub token: String,
    pub post_text: String,
    pub group_name: Option<String>,
    pub author_name: Option<String>,
    pub page_url: Option<String>,
    pub post_age: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScreenshotScanRequest {
    #[serde(deserialize_with = "chat_id")]
    pub chat_id: String,
    pub business_id: i64,
    pub token: String,
    pub extracted_text: String,
    pub group_name: Option<String>,
    pub author_name: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ScanResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

impl From<&Outcome> for ScanResponse {
    fn from(outcome: &Outcome) -> Self {
        let (matched, reason, score) = match outcome {
            Outcome::Persisted { verdict, .. } => (true, None, Some(verdict.intent_score)),
            Outcome::Rejected { verdict, .. } => {
                (false, Some("below_threshold"), Some(verdict.intent_score))
            }
            Outcome::Duplicate => (false, Some("duplicate"), None),
            Outcome::SelfEcho => (false, Some("self_echo"), None),
            Outcome::NoKeywordMatch => (false, Some("no_keyword_match"), None),
            Outcome::Dropped { .. } => (false, Some("ai_unavailable"), None),
        };
        Self {
            matched,
            reason,
            score,
        }
    }
}

struct ScanAuth<'a> {
    chat_id: &'a str,
    business_id: i64,
    token: &'a str,
}

pub(super) async fn scan(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    let auth = ScanAuth {
        chat_id: &body.chat_id,
        business_id: body.business_id,
        token: &body.token,
    };
    let candidate = || {
        from_bookmarklet(ManualPost {
            text: body.post_text.clone(),
            group_name: body.group_name.clone(),
            author_name: body.author_name.clone(),
            page_url: body.page_url.clone(),
            post_age: body.post_age.clone(),
        })
    };
    run_scan(&state, req_id.0, &auth, candidate, body.page_url.as_deref()).await
}

pub(super) async fn scan_screenshot(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ScreenshotScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    let auth = ScanAuth {
        chat_id: &body.chat_id,
        business_id: body.business_id,
        token: &body.token,
    };
    let candidate = || {
        from_screenshot(OcrExtraction {
            text: body.extracted_text.clone(),
            group_name: body.group_name.clone(),
            author_name: body.author_name.clone(),
            page_url: body.page_url.clone(),
        })
    };
    run_scan(&state, req_id.0, &auth, candidate, body.page_url.as_deref()).await
}

async fn run_scan(
    state: &AppState,
    request_id: String,
    auth: &ScanAuth<'_>,
    candidate: impl FnOnce() -> Result<PostCandidate, SourceError>,
    page_url: Option<&str>,
) -> Result<Json<ScanResponse>, ApiError> {
    let now = Utc::now();
    if !state
        .tokens
        .verify(auth.chat_id, auth.business_id, auth.token, now)
    {
        tracing::debug!(business_id = auth.business_id, "scan: invalid token");
        return Err(ApiError::new(request_id, "unauthorized", "invalid scan token"));
    }

    if !state.limiter.allow(ratelimit::SCAN, auth.chat_id, now).await {
        tracing::debug!(business_id = auth.business_id, chat = auth.chat_id, "scan: rate limited");
        return Err(ApiError::new(request_id, "rate_limited", "too many scans, slow down"));
    }

    let candidate = candidate()
        .map_err(|e| ApiError::new(request_id.clone(), "validation_error", e.to_string()))?;

    let target = state
        .pipeline
        .manual_target(auth.business_id, page_url)
        .await
        .map_err(|e| map_pipeline_error(request_id.clone(), &e))?;

    let options = EvaluateOptions::manual(Some(auth.chat_id.to_string()));
    let outcome = state
        .pipeline
        .evaluate(&target, &candidate, &options, now)
        .await
        .map_err(|e| map_pipeline_error(request_id.clone(), &e))?;

    tracing::info!(
        business_id = auth.business_id,
        source = %candidate.source,
        outcome = outcome.label(),
        "scan: evaluated"
    );
    Ok(Json(ScanResponse::from(&outcome)))
}
