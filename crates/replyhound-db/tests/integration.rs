//! Offline unit tests for replyhound-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use replyhound_core::{Business, Campaign, CampaignStatus, Platform, ResponseContext, Tone};
use replyhound_db::{BusinessRow, CampaignRow, DbError, PoolConfig, ResponseContextRow};
use uuid::Uuid;

#[test]
fn pool_config_default_is_small() {
    let config = PoolConfig::default();
    assert_eq!(config.max_connections, 10);
    assert_eq!(config.min_connections, 1);
}

#[test]
fn business_row_converts_to_domain() {
    let row = BusinessRow {
        id: 3,
        public_id: Uuid::new_v4(),
        name: "Lakeside Bocce Club".to_string(),
        business_type: "venue".to_string(),
        core_offering: "Bocce courts".to_string(),
        preferred_tone: "empathetic".to_string(),
        contact: None,
        location: Some("Chicago".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let business = Business::try_from(row).unwrap();
    assert_eq!(business.id, 3);
    assert_eq!(business.preferred_tone, Tone::Empathetic);
}

#[test]
fn business_row_with_unknown_tone_is_rejected() {
    let row = BusinessRow {
        id: 3,
        public_id: Uuid::new_v4(),
        name: "x".to_string(),
        business_type: "x".to_string(),
        core_offering: "x".to_string(),
        preferred_tone: "sarcastic".to_string(),
        contact: None,
        location: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert!(matches!(
        Business::try_from(row),
        Err(DbError::InvalidColumn {
            column: "preferred_tone",
            ..
        })
    ));
}

#[test]
fn campaign_row_converts_to_domain() {
    let row = CampaignRow {
        id: 9,
        business_id: 3,
        platform: "google_alerts".to_string(),
        status: "paused".to_string(),
        keywords: vec![],
        target_groups: vec!["https://www.google.com/alerts/feeds/1/2".to_string()],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let campaign = Campaign::try_from(row).unwrap();
    assert_eq!(campaign.platform, Platform::GoogleAlerts);
    assert_eq!(campaign.status, CampaignStatus::Paused);
    assert!(campaign.is_persisted());
}

#[test]
fn response_context_row_converts_to_domain() {
    let row = ResponseContextRow {
        response_id: 11,
        lead_id: 10,
        business_id: 3,
        content: "reply".to_string(),
        status: "approved".to_string(),
        platform: "reddit".to_string(),
        post_url: None,
    };

    let ctx = ResponseContext::try_from(row).unwrap();
    assert_eq!(ctx.response_id, 11);
    assert!(ctx.platform.supports_direct_post());
}
