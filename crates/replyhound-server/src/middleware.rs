use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use replyhound_core::{AppConfig, Environment};
use serde::Serialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Shared secret Telegram echoes on every webhook call.
#[derive(Debug, Clone)]
pub struct WebhookAuth {
    secret: Option<Arc<str>>,
}

impl WebhookAuth {
    /// In development a missing secret disables the check. Elsewhere a bot
    /// token without a webhook secret fails startup.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let secret = config
            .telegram_webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Arc::from);

        if secret.is_none() && config.telegram_bot_token.is_some() {
            if config.env == Environment::Development {
                tracing::warn!(
                    "TELEGRAM_WEBHOOK_SECRET not set; webhook authentication disabled in development"
                );
            } else {
                anyhow::bail!("TELEGRAM_WEBHOOK_SECRET is required when TELEGRAM_BOT_TOKEN is set");
            }
        }
        Ok(Self { secret })
    }

    #[must_use]
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: Some(Arc::from(secret)),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    fn allows(&self, presented: Option<&str>) -> bool {
        match (&self.secret, presented) {
            (None, _) => true,
            (Some(expected), Some(presented)) => {
                bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
            }
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Rejects webhook calls that do not carry the configured secret header.
pub async fn require_webhook_secret(
    State(auth): State<WebhookAuth>,
    req: Request,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(TELEGRAM_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    if auth.allows(presented) {
        return next.run(req).await;
    }

    tracing::warn!("webhook: rejected call with missing or invalid secret");
    (
        StatusCode::UNAUTHORIZED,
        Json(MiddlewareErrorBody {
            error: MiddlewareError {
                code: "unauthorized",
                message: "missing or invalid webhook secret",
            },
        }),
    )
        .into_response()
}
