//! Operator notifications and their button actions.
//!
//! Callback payloads carry the response id:
//! - `fb:<kind>:<response_id>`: feedback, recorded at most once.
//! - `post:<response_id>:<issued_unix_secs>`: direct post, expires after a TTL.
//! - `done:<response_id>`: operator confirms they posted the reply by hand.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use replyhound_core::{
    types::truncate_chars, Business, Button, ButtonKind, ButtonLayout, DeliveryError,
    FeedbackKind, IntentVerdict, LeadStore, Messenger, Platform, PostCandidate, ReplyPoster,
    ResponseStatus,
};

use crate::error::PipelineError;
use crate::ledger::Ledger;

const EXCERPT_CHARS: usize = 500;
const INTENT_CELLS: u8 = 10;

pub const ALREADY_RECORDED: &str = "Already recorded";
pub const LINK_EXPIRED: &str = "Link expired";
pub const ALREADY_POSTED: &str = "Already posted";
const GENERIC_FAILURE: &str = "Something went wrong, please try again";

// ---------------------------------------------------------------------------
// Callback payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Feedback {
        kind: FeedbackKind,
        response_id: i64,
    },
    Post {
        response_id: i64,
        issued_at: i64,
    },
    MarkPosted {
        response_id: i64,
    },
}

impl Action {
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Action::Feedback { kind, response_id } => format!("fb:{kind}:{response_id}"),
            Action::Post {
                response_id,
                issued_at,
            } => format!("post:{response_id}:{issued_at}"),
            Action::MarkPosted { response_id } => format!("done:{response_id}"),
        }
    }

    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.trim().split(':');
        let action = match (parts.next()?, parts.next()?, parts.next()) {
            ("fb", kind, Some(id)) => Action::Feedback {
                kind: kind.parse().ok()?,
                response_id: id.parse().ok()?,
            },
            ("post", id, Some(issued)) => Action::Post {
                response_id: id.parse().ok()?,
                issued_at: issued.parse().ok()?,
            },
            ("done", id, None) => Action::MarkPosted {
                response_id: id.parse().ok()?,
            },
            _ => return None,
        };
        parts.next().is_none().then_some(action)
    }
}

fn is_feedback_row(row: &[Button]) -> bool {
    row.iter()
        .any(|b| matches!(&b.kind, ButtonKind::Callback(data) if data.starts_with("fb:")))
}

fn is_publish_row(row: &[Button]) -> bool {
    row.iter().any(|b| {
        matches!(&b.kind, ButtonKind::Callback(data)
            if data.starts_with("post:") || data.starts_with("done:"))
    })
}

/// Swap the feedback row for a single disabled marker.
#[must_use]
pub fn replace_feedback_row(layout: &ButtonLayout, kind: FeedbackKind) -> ButtonLayout {
    let marker = vec![Button::disabled(format!("✓ {}", kind.label()))];
    let mut replaced = false;
    let mut out: ButtonLayout = layout
        .iter()
        .map(|row| {
            if is_feedback_row(row) {
                replaced = true;
                marker.clone()
            } else {
                row.clone()
            }
        })
        .collect();
    if !replaced {
        out.push(marker);
    }
    out
}

fn replace_publish_row(layout: &ButtonLayout, replacement: Vec<Button>) -> ButtonLayout {
    let mut replaced = false;
    let mut out: ButtonLayout = layout
        .iter()
        .map(|row| {
            if is_publish_row(row) {
                replaced = true;
                replacement.clone()
            } else {
                row.clone()
            }
        })
        .collect();
    if !replaced {
        out.insert(0, replacement);
    }
    out
}

// ---------------------------------------------------------------------------
// Message rendering
// ---------------------------------------------------------------------------

/// Everything a lead notification shows.
#[derive(Debug, Clone, Copy)]
pub struct LeadNotice<'a> {
    pub business: &'a Business,
    pub platform: Platform,
    pub candidate: &'a PostCandidate,
    pub verdict: &'a IntentVerdict,
    pub reply: Option<&'a str>,
    pub response_id: i64,
}

/// Minimal escaping for Telegram's HTML parse mode.
#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `●●●●●●●●○○ 8/10`
#[must_use]
pub fn intent_bar(score: u8) -> String {
    let filled = score.min(INTENT_CELLS);
    let mut bar = String::new();
    for cell in 0..INTENT_CELLS {
        bar.push(if cell < filled { '●' } else { '○' });
    }
    format!("{bar} {filled}/{INTENT_CELLS}")
}

#[must_use]
pub fn render_message(notice: &LeadNotice<'_>) -> String {
    let c = notice.candidate;
    let mut summary = vec![notice.platform.as_str().to_string()];
    summary.extend(
        [&c.group_name, &c.author_name, &c.age_hint]
            .into_iter()
            .flatten()
            .map(|s| escape_html(s)),
    );

    let mut message = format!(
        "🎯 <b>New lead for {}</b>\n{}\nIntent: {}\n",
        escape_html(&notice.business.name),
        summary.join(" · "),
        intent_bar(notice.verdict.intent_score),
    );
    if !notice.verdict.reasoning.is_empty() {
        message.push_str(&format!("<i>{}</i>\n", escape_html(&notice.verdict.reasoning)));
    }

    let text = c.text();
    let excerpt = truncate_chars(&text, EXCERPT_CHARS);
    let ellipsis = if excerpt.len() < text.len() { "…" } else { "" };
    message.push_str(&format!(
        "\n<blockquote>{}{ellipsis}</blockquote>\n",
        escape_html(&excerpt)
    ));

    if let Some(reply) = notice.reply {
        message.push_str(&format!(
            "\n💬 <b>Suggested reply</b>\n{}",
            escape_html(reply)
        ));
    }
    message
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// A button tap delivered by the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action_id: String,
    pub chat: String,
    pub message_id: String,
    pub data: String,
    /// The message's buttons as the transport last showed them, when known.
    pub current_buttons: Option<ButtonLayout>,
}

pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn LeadStore>,
    ledger: Ledger,
    poster: Option<Arc<dyn ReplyPoster>>,
    post_ttl: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn LeadStore>,
        ledger: Ledger,
        post_ttl: Duration,
    ) -> Self {
        Self {
            messenger,
            store,
            ledger,
            poster: None,
            post_ttl,
        }
    }

    #[must_use]
    pub fn with_poster(mut self, poster: Arc<dyn ReplyPoster>) -> Self {
        self.poster = Some(poster);
        self
    }

    #[must_use]
    pub fn can_post_directly(&self, platform: Platform) -> bool {
        platform.supports_direct_post() && self.poster.is_some()
    }

    #[must_use]
    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Buttons for a fresh notification.
    #[must_use]
    pub fn layout_for(&self, notice: &LeadNotice<'_>, now: DateTime<Utc>) -> ButtonLayout {
        let mut layout = ButtonLayout::new();
        let link = notice.candidate.link.as_deref();

        if let Some(url) = link {
            layout.push(vec![Button::url("🔗 Open post", url)]);
        }

        if notice.reply.is_some() {
            if link.is_some() && self.can_post_directly(notice.platform) {
                let action = Action::Post {
                    response_id: notice.response_id,
                    issued_at: now.timestamp(),
                };
                layout.push(vec![Button::callback("📤 Post this reply", action.encode())]);
            } else {
                let action = Action::MarkPosted {
                    response_id: notice.response_id,
                };
                layout.push(vec![Button::callback("✅ I posted it", action.encode())]);
            }
        }

        layout.push(
            FeedbackKind::ALL
                .iter()
                .map(|&kind| {
                    let action = Action::Feedback {
                        kind,
                        response_id: notice.response_id,
                    };
                    Button::callback(kind.label(), action.encode())
                })
                .collect(),
        );
        layout
    }

    /// Send a lead notification. Returns the transport's message id.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the messenger rejects the message.
    pub async fn notify(
        &self,
        chat: &str,
        notice: &LeadNotice<'_>,
        now: DateTime<Utc>,
    ) -> Result<String, DeliveryError> {
        let message = render_message(notice);
        let layout = self.layout_for(notice, now);
        self.messenger.send(chat, &message, &layout).await
    }

    /// Handle a button tap and answer it with a short toast. Never fails:
    /// every problem becomes operator-facing text.
    pub async fn handle_action(&self, request: &ActionRequest, now: DateTime<Utc>) -> String {
        let toast = match Action::parse(&request.data) {
            None => "Unknown action".to_string(),
            Some(action) => match self.run_action(request, action, now).await {
                Ok(toast) => toast,
                Err(e) => {
                    tracing::warn!(data = %request.data, error = %e, "dispatch: action failed");
                    GENERIC_FAILURE.to_string()
                }
            },
        };

        if let Err(e) = self.messenger.answer_action(&request.action_id, &toast).await {
            tracing::warn!(action_id = %request.action_id, error = %e, "dispatch: answer failed");
        }
        toast
    }

    async fn run_action(
        &self,
        request: &ActionRequest,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        match action {
            Action::Feedback { kind, response_id } => {
                self.record_feedback(request, kind, response_id).await
            }
            Action::Post {
                response_id,
                issued_at,
            } => self.post_directly(request, response_id, issued_at, now).await,
            Action::MarkPosted { response_id } => self.mark_posted(request, response_id).await,
        }
    }

    async fn current_layout(&self, request: &ActionRequest, response_id: i64) -> ButtonLayout {
        if let Some(layout) = &request.current_buttons {
            return layout.clone();
        }
        match self.store.response_context(response_id).await {
            Ok(Some(ctx)) => ctx
                .post_url
                .map(|url| vec![vec![Button::url("🔗 Open post", url)]])
                .unwrap_or_default(),
            _ => ButtonLayout::new(),
        }
    }

    async fn edit(&self, request: &ActionRequest, layout: &ButtonLayout) {
        if let Err(e) = self
            .messenger
            .edit_buttons(&request.chat, &request.message_id, layout)
            .await
        {
            tracing::warn!(
                chat = %request.chat,
                message_id = %request.message_id,
                error = %e,
                "dispatch: button edit failed"
            );
        }
    }

    async fn record_feedback(
        &self,
        request: &ActionRequest,
        kind: FeedbackKind,
        response_id: i64,
    ) -> Result<String, PipelineError> {
        if self.store.feedback_for_response(response_id).await?.is_some() {
            return Ok(ALREADY_RECORDED.to_string());
        }
        if !self
            .store
            .insert_feedback_if_absent(response_id, kind)
            .await?
        {
            return Ok(ALREADY_RECORDED.to_string());
        }
        if kind == FeedbackKind::Positive {
            self.store
                .update_response_status(response_id, ResponseStatus::Approved)
                .await?;
        }
        tracing::info!(response_id, feedback = %kind, "dispatch: feedback recorded");

        let layout = replace_feedback_row(&self.current_layout(request, response_id).await, kind);
        self.edit(request, &layout).await;
        Ok(format!("Thanks! Recorded {}", kind.label()))
    }

    async fn post_directly(
        &self,
        request: &ActionRequest,
        response_id: i64,
        issued_at: i64,
        now: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        let ttl = i64::try_from(self.post_ttl.as_secs()).unwrap_or(i64::MAX);
        if now.timestamp().saturating_sub(issued_at) > ttl {
            return Ok(LINK_EXPIRED.to_string());
        }
        let Some(poster) = &self.poster else {
            return Ok("Direct posting is not configured".to_string());
        };
        let Some(ctx) = self.store.response_context(response_id).await? else {
            return Ok("Reply not found".to_string());
        };
        if !ctx.platform.supports_direct_post() {
            return Ok(format!("Direct posting is not available for {}", ctx.platform));
        }
        let Some(post_url) = ctx.post_url.as_deref() else {
            return Ok("No post link to reply to".to_string());
        };
        if self.ledger.is_self_echo(&ctx.content).await?
            || !self.ledger.claim_post(response_id).await?
        {
            return Ok(ALREADY_POSTED.to_string());
        }

        let permalink = match poster.post_reply(post_url, &ctx.content).await {
            Ok(permalink) => permalink,
            Err(e) => {
                tracing::warn!(response_id, error = %e, "dispatch: direct post failed");
                if let Err(e) = self.ledger.release_post(response_id).await {
                    tracing::warn!(
                        response_id,
                        error = %e,
                        "dispatch: failed to release post claim"
                    );
                }
                return Ok("Posting failed".to_string());
            }
        };

        // The reply is live: record it before anything else can fail.
        self.ledger.record_published(&ctx.content).await?;
        self.store
            .update_response_status(response_id, ResponseStatus::Approved)
            .await?;
        tracing::info!(response_id, permalink = %permalink, "dispatch: reply posted");

        let layout = replace_publish_row(
            &self.current_layout(request, response_id).await,
            vec![Button::url("✓ Posted", permalink)],
        );
        self.edit(request, &layout).await;
        Ok("Posted ✓".to_string())
    }

    async fn mark_posted(
        &self,
        request: &ActionRequest,
        response_id: i64,
    ) -> Result<String, PipelineError> {
        let Some(ctx) = self.store.response_context(response_id).await? else {
            return Ok("Reply not found".to_string());
        };
        self.store
            .update_response_status(response_id, ResponseStatus::Approved)
            .await?;
        let inserted = self.ledger.record_published(&ctx.content).await?;

        let layout = replace_publish_row(
            &self.current_layout(request, response_id).await,
            vec![Button::disabled("✓ Posted")],
        );
        self.edit(request, &layout).await;
        if inserted == 0 {
            return Ok(ALREADY_RECORDED.to_string());
        }
        Ok("Marked as posted".to_string())
    }
}
