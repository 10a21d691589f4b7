use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use replyhound_core::{ButtonKind, NewBusiness, Platform};
use replyhound_pipeline::memory::RecordingMessenger;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::build_app;
use crate::middleware::WebhookAuth;
use crate::state::AppState;
use crate::test_support::{config, state_with};

const CHAT: i64 = 4242;

struct TestApp {
    app: Router,
    state: AppState,
    messenger: Arc<RecordingMessenger>,
    business_id: i64,
}

async fn test_app(extra: &[(&str, &str)], auth: WebhookAuth) -> TestApp {
    let config = config(extra);
    let messenger = Arc::new(RecordingMessenger::new());
    let state = state_with(&config, messenger.clone());
    let business = state
        .store
        .create_business_with_campaign(&NewBusiness {
            name: "Bocce Social".to_string(),
            business_type: "bocce venue".to_string(),
            core_offering: "Indoor bocce for team events".to_string(),
            platform: Some(Platform::Facebook),
            keywords: vec!["team-building".to_string(), "bocce".to_string()],
            ..NewBusiness::default()
        })
        .await
        .unwrap();
    TestApp {
        app: build_app(state.clone(), auth),
        state,
        messenger,
        business_id: business.id,
    }
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn scan_body(t: &TestApp, text: &str) -> Value {
    json!({
        "chat_id": CHAT,
        "business_id": t.business_id,
        "token": t.state.tokens.issue(&CHAT.to_string(), t.business_id, Utc::now()),
        "post_text": text,
        "group_name": "Chicago Office Managers",
        "page_url": "https://www.facebook.com/groups/123/posts/456",
    })
}

const BOCCE_POST: &str = "Any fun team-building spots near Chicago? We tried bocce once";

#[tokio::test]
async fn health_reports_memory_backend() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    let request = Request::builder()
        .uri("/api/v1/health")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "memory");
}

#[tokio::test]
async fn scan_rejects_bad_token() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    let mut body = scan_body(&t, BOCCE_POST);
    body["token"] = json!("deadbeef");

    let (status, json) = post_json(&t.app, "/api/v1/scan", &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");
    assert!(t.messenger.sent().await.is_empty());
}

#[tokio::test]
async fn matching_scan_notifies_the_chat_once() {
    let t = test_app(&[], WebhookAuth::disabled()).await;

    let (status, json) = post_json(&t.app, "/api/v1/scan", &scan_body(&t, BOCCE_POST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"matched": true, "score": 8}));

    let sent = t.messenger.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat, CHAT.to_string());

    let (status, json) = post_json(&t.app, "/api/v1/scan", &scan_body(&t, BOCCE_POST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"matched": false, "reason": "duplicate"}));
    assert_eq!(t.messenger.sent().await.len(), 1);
}

#[tokio::test]
async fn screenshot_scan_accepts_string_chat_id() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    let body = json!({
        "chat_id": CHAT.to_string(),
        "business_id": t.business_id,
        "token": t.state.tokens.issue(&CHAT.to_string(), t.business_id, Utc::now()),
        "extracted_text": "Looking for team-building ideas for 20 people next month",
    });

    let (status, json) = post_json(&t.app, "/api/v1/scan/screenshot", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["matched"], true);
}

#[tokio::test]
async fn blank_post_is_a_validation_error() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    let (status, json) = post_json(&t.app, "/api/v1/scan", &scan_body(&t, "   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn unknown_business_is_not_found() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    let body = json!({
        "chat_id": CHAT,
        "business_id": 999,
        "token": t.state.tokens.issue(&CHAT.to_string(), 999, Utc::now()),
        "post_text": BOCCE_POST,
    });
    let (status, json) = post_json(&t.app, "/api/v1/scan", &body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn scans_are_rate_limited_per_chat() {
    let t = test_app(&[("REPLYHOUND_SCAN_RATE_MAX", "2")], WebhookAuth::disabled()).await;
    for text in ["first post about bocce", "second post about bocce"] {
        let (status, _) = post_json(&t.app, "/api/v1/scan", &scan_body(&t, text)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, json) =
        post_json(&t.app, "/api/v1/scan", &scan_body(&t, "third post about bocce")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}

#[tokio::test]
async fn webhook_requires_secret_header() {
    let t = test_app(&[], WebhookAuth::with_secret("hook-secret")).await;
    let update = json!({"update_id": 1, "message": {"message_id": 1, "chat": {"id": CHAT}, "text": "/help"}});

    let (status, _) = post_json(&t.app, "/api/v1/telegram/webhook", &update).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/telegram/webhook")
        .header("content-type", "application/json")
        .header(crate::middleware::TELEGRAM_SECRET_HEADER, "hook-secret")
        .body(Body::from(update.to_string()))
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(t.messenger.sent().await[0].text.contains("/onboard"));
}

#[tokio::test]
async fn webhook_start_opens_the_wizard() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    let update = json!({"update_id": 2, "message": {"message_id": 5, "chat": {"id": CHAT}, "text": "/start"}});

    let (status, json) = post_json(&t.app, "/api/v1/telegram/webhook", &update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"ok": true}));

    let sent = t.messenger.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "What is your business called?");
}

#[tokio::test]
async fn webhook_token_lists_businesses_for_the_operator() {
    let t = test_app(&[("TELEGRAM_CHAT_ID", "4242")], WebhookAuth::disabled()).await;
    let update = json!({"update_id": 3, "message": {"message_id": 6, "chat": {"id": CHAT}, "text": "/token@replyhound_bot"}});
    post_json(&t.app, "/api/v1/telegram/webhook", &update).await;

    let token = t
        .state
        .tokens
        .issue(&CHAT.to_string(), t.business_id, Utc::now());
    let sent = t.messenger.sent().await;
    assert!(sent[0].text.contains("Bocce Social"), "{}", sent[0].text);
    assert!(sent[0].text.contains(&token));

    let stranger = json!({"update_id": 4, "message": {"message_id": 7, "chat": {"id": 77}, "text": "/token"}});
    post_json(&t.app, "/api/v1/telegram/webhook", &stranger).await;
    let sent = t.messenger.sent().await;
    assert!(sent[1].text.contains("only available"));
}

#[tokio::test]
async fn webhook_feedback_tap_is_recorded() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    post_json(&t.app, "/api/v1/scan", &scan_body(&t, BOCCE_POST)).await;

    let notice = t.messenger.sent().await.remove(0);
    let data = notice
        .buttons
        .iter()
        .flatten()
        .find_map(|b| match &b.kind {
            ButtonKind::Callback(data) if data.starts_with("fb:positive:") => Some(data.clone()),
            _ => None,
        })
        .expect("feedback button");

    let update = json!({
        "update_id": 5,
        "callback_query": {
            "id": "cb-77",
            "data": data,
            "message": {"message_id": notice.id.parse::<i64>().unwrap(), "chat": {"id": CHAT}}
        }
    });
    let (status, _) = post_json(&t.app, "/api/v1/telegram/webhook", &update).await;
    assert_eq!(status, StatusCode::OK);

    let answers = t.messenger.answers().await;
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].0, "cb-77");
    assert!(answers[0].1.starts_with("Thanks!"), "{}", answers[0].1);
}

#[tokio::test]
async fn webhook_noop_tap_is_answered_silently() {
    let t = test_app(&[], WebhookAuth::disabled()).await;
    let update = json!({
        "update_id": 6,
        "callback_query": {"id": "cb-1", "data": "noop", "message": {"message_id": 1, "chat": {"id": CHAT}}}
    });
    post_json(&t.app, "/api/v1/telegram/webhook", &update).await;
    assert_eq!(
        t.messenger.answers().await,
        vec![("cb-1".to_string(), String::new())]
    );
}
