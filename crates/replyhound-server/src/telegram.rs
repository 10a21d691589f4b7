//! Telegram Bot API adapter for the [`Messenger`] port.
//!
//! Messages are sent with HTML parse mode and an inline keyboard. Telegram has
//! no disabled buttons, so markers are callback buttons carrying [`NOOP`].

use std::time::Duration;

use async_trait::async_trait;
use replyhound_core::{AppConfig, Button, ButtonKind, ButtonLayout, DeliveryError, Messenger};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const NOOP: &str = "noop";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl From<&ButtonLayout> for InlineKeyboardMarkup {
    fn from(layout: &ButtonLayout) -> Self {
        let inline_keyboard = layout
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| {
                        let (url, callback_data) = match &b.kind {
                            ButtonKind::Url(url) => (Some(url.clone()), None),
                            ButtonKind::Callback(data) => (None, Some(data.clone())),
                            ButtonKind::Disabled => (None, Some(NOOP.to_string())),
                        };
                        InlineKeyboardButton {
                            text: b.label.clone(),
                            url,
                            callback_data,
                        }
                    })
                    .collect()
            })
            .collect();
        Self { inline_keyboard }
    }
}

impl From<&InlineKeyboardMarkup> for ButtonLayout {
    fn from(markup: &InlineKeyboardMarkup) -> Self {
        markup
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| match (&b.url, &b.callback_data) {
                        (Some(url), _) => Button::url(&b.text, url),
                        (None, Some(data)) if data != NOOP => Button::callback(&b.text, data),
                        _ => Button::disabled(&b.text),
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditReplyMarkup<'a> {
    chat_id: &'a str,
    message_id: i64,
    reply_markup: InlineKeyboardMarkup,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramClient {
    http: Client,
    base: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(bot_token: &str) -> Result<Self, reqwest::Error> {
        Self::with_base_url(bot_token, DEFAULT_API_BASE)
    }

    /// Point the client at a custom API host (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn with_base_url(bot_token: &str, api_base: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base: format!("{}/bot{bot_token}", api_base.trim_end_matches('/')),
        })
    }

    /// `None` when no bot token is configured.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, reqwest::Error> {
        config
            .telegram_bot_token
            .as_deref()
            .map(Self::new)
            .transpose()
    }

    async fn call<B: Serialize + Sync, T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<Option<T>, DeliveryError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(body)
            .send()
            .await
            .map_err(|e| DeliveryError(format!("telegram {method}: {e}")))?;

        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| {
                DeliveryError(format!("telegram {method}: bad response ({status}): {e}"))
            })?;

        if !envelope.ok {
            return Err(DeliveryError(format!(
                "telegram {method} failed ({status}): {}",
                envelope.description.unwrap_or_default()
            )));
        }
        Ok(envelope.result)
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(
        &self,
        chat: &str,
        message: &str,
        buttons: &ButtonLayout,
    ) -> Result<String, DeliveryError> {
        let body = SendMessage {
            chat_id: chat,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: (!buttons.is_empty()).then(|| InlineKeyboardMarkup::from(buttons)),
        };
        let sent: Option<SentMessage> = self.call("sendMessage", &body).await?;
        sent.map(|m| m.message_id.to_string())
            .ok_or_else(|| DeliveryError("telegram sendMessage: missing result".to_string()))
    }

    async fn edit_buttons(
        &self,
        chat: &str,
        message_id: &str,
        buttons: &ButtonLayout,
    ) -> Result<(), DeliveryError> {
        let message_id = message_id
            .parse()
            .map_err(|_| DeliveryError(format!("invalid telegram message id {message_id}")))?;
        let body = EditReplyMarkup {
            chat_id: chat,
            message_id,
            reply_markup: InlineKeyboardMarkup::from(buttons),
        };
        self.call::<_, serde_json::Value>("editMessageReplyMarkup", &body)
            .await?;
        Ok(())
    }

    async fn answer_action(&self, action_id: &str, toast: &str) -> Result<(), DeliveryError> {
        let body = AnswerCallbackQuery {
            callback_query_id: action_id,
            text: toast,
        };
        self.call::<_, bool>("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn layout() -> ButtonLayout {
        vec![
            vec![Button::url("🔗 Open post", "https://reddit.com/r/x/1")],
            vec![Button::callback("👍 Good", "fb:positive:7"), Button::disabled("✓")],
        ]
    }

    #[test]
    fn layout_round_trips_through_inline_keyboard() {
        let markup = InlineKeyboardMarkup::from(&layout());
        assert_eq!(markup.inline_keyboard[1][1].callback_data.as_deref(), Some(NOOP));
        assert_eq!(ButtonLayout::from(&markup), layout());
    }

    #[tokio::test]
    async fn send_posts_html_message_with_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": "42",
                "parse_mode": "HTML",
                "reply_markup": {"inline_keyboard": [[{"text": "🔗 Open post", "url": "https://reddit.com/r/x/1"}]]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 981}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url("TOKEN", &server.uri()).unwrap();
        let buttons = vec![vec![Button::url("🔗 Open post", "https://reddit.com/r/x/1")]];
        let id = client.send("42", "<b>hi</b>", &buttons).await.unwrap();
        assert_eq!(id, "981");
    }

    #[tokio::test]
    async fn api_errors_become_delivery_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url("TOKEN", &server.uri()).unwrap();
        let err = client.send("42", "hi", &Vec::new()).await.unwrap_err();
        assert!(err.0.contains("chat not found"), "{err}");
    }

    #[tokio::test]
    async fn edit_and_answer_hit_their_methods() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/editMessageReplyMarkup"))
            .and(body_partial_json(json!({"chat_id": "42", "message_id": 981})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/answerCallbackQuery"))
            .and(body_partial_json(json!({"callback_query_id": "cb-1", "text": "Thanks!"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url("TOKEN", &server.uri()).unwrap();
        client.edit_buttons("42", "981", &layout()).await.unwrap();
        client.answer_action("cb-1", "Thanks!").await.unwrap();
    }

    #[tokio::test]
    async fn non_numeric_message_id_is_rejected_locally() {
        let client = TelegramClient::with_base_url("TOKEN", "http://127.0.0.1:9").unwrap();
        assert!(client.edit_buttons("42", "abc", &layout()).await.is_err());
    }
}
