//! Telegram webhook: button taps go to the dispatcher, text goes to the
//! onboarding wizard or the bot commands.
//!
//! Telegram retries any non-2xx answer, so every update is acknowledged with
//! `200 {"ok": true}` once it has been handled or deliberately ignored.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use replyhound_core::ButtonLayout;
use replyhound_pipeline::dispatch::escape_html;
use replyhound_pipeline::{ratelimit, ActionRequest, PipelineError, WizardReply};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;
use crate::telegram::{InlineKeyboardMarkup, NOOP};

const HELP: &str = "Commands:\n\
/onboard: register a business\n\
/token: bookmarklet tokens for this chat\n\
/admin: remove or update a business\n\
/help: this message";

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

pub(super) async fn webhook(
    State(state): State<AppState>,
    Json(update): Json<Update>,
) -> Json<Value> {
    let now = Utc::now();
    if let Some(query) = update.callback_query {
        handle_callback(&state, query, now).await;
    } else if let Some(message) = update.message {
        handle_message(&state, message, now).await;
    } else {
        tracing::debug!(update_id = update.update_id, "webhook: ignoring update");
    }
    Json(json!({ "ok": true }))
}

async fn handle_callback(state: &AppState, query: CallbackQuery, now: DateTime<Utc>) {
    let data = query.data.unwrap_or_default();

    let Some(message) = query.message else {
        answer(state, &query.id, "This message is too old").await;
        return;
    };
    if data == NOOP {
        answer(state, &query.id, "").await;
        return;
    }

    let chat = message.chat.id.to_string();
    if !state.limiter.allow(ratelimit::WEBHOOK, &chat, now).await {
        tracing::debug!(chat = %chat, "webhook: rate limited");
        answer(state, &query.id, "Too many taps, try again shortly").await;
        return;
    }

    let request = ActionRequest {
        action_id: query.id,
        chat,
        message_id: message.message_id.to_string(),
        data,
        current_buttons: message.reply_markup.as_ref().map(ButtonLayout::from),
    };
    let toast = state.dispatcher.handle_action(&request, now).await;
    tracing::debug!(data = %request.data, toast = %toast, "webhook: action handled");
}

async fn answer(state: &AppState, action_id: &str, toast: &str) {
    if let Err(e) = state
        .dispatcher
        .messenger()
        .answer_action(action_id, toast)
        .await
    {
        tracing::warn!(action_id, error = %e, "webhook: answer failed");
    }
}

async fn handle_message(state: &AppState, message: Message, now: DateTime<Utc>) {
    let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return;
    };
    let chat = message.chat.id.to_string();
    if !state.limiter.allow(ratelimit::WEBHOOK, &chat, now).await {
        tracing::debug!(chat = %chat, "webhook: rate limited");
        return;
    }

    let reply = match respond(state, &chat, text, now).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(chat = %chat, error = %e, "webhook: message failed");
            "Something went wrong, please try again".to_string()
        }
    };

    if let Err(e) = state
        .dispatcher
        .messenger()
        .send(&chat, &reply, &ButtonLayout::new())
        .await
    {
        tracing::warn!(chat = %chat, error = %e, "webhook: reply failed");
    }
}

/// Reply text for one incoming message, already HTML-safe.
async fn respond(
    state: &AppState,
    chat: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<String, PipelineError> {
    if let WizardReply::Reply(reply) = state.wizard.handle(chat, text, now).await? {
        return Ok(escape_html(&reply));
    }

    let command = text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default();

    match command {
        "/start" | "/onboard" => Ok(escape_html(&state.wizard.start_onboarding(chat, now).await?)),
        "/admin" if is_operator(state, chat) => {
            Ok(escape_html(&state.wizard.start_admin(chat, now).await?))
        }
        "/token" if is_operator(state, chat) => token_listing(state, chat, now).await,
        "/admin" | "/token" => {
            Ok("That command is only available in the operator chat.".to_string())
        }
        _ => Ok(HELP.to_string()),
    }
}

/// Without a configured operator chat every chat is trusted.
fn is_operator(state: &AppState, chat: &str) -> bool {
    state
        .operator_chat
        .as_deref()
        .is_none_or(|operator| operator == chat)
}

async fn token_listing(
    state: &AppState,
    chat: &str,
    now: DateTime<Utc>,
) -> Result<String, PipelineError> {
    let businesses = state.store.list_businesses().await?;
    if businesses.is_empty() {
        return Ok("No businesses yet. Send /onboard to add one.".to_string());
    }

    let mut lines = vec![format!("Scan tokens for chat <code>{}</code>:", escape_html(chat))];
    for business in businesses {
        lines.push(format!(
            "<b>{}</b> (id {})\n<code>{}</code>",
            escape_html(&business.name),
            business.id,
            state.tokens.issue(chat, business.id, now)
        ));
    }
    if let Some(base) = &state.public_base_url {
        lines.push(format!(
            "Scan endpoint: {}/api/v1/scan",
            escape_html(base.trim_end_matches('/'))
        ));
    }
    Ok(lines.join("\n\n"))
}
