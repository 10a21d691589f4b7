use std::path::Path;

use super::*;

fn campaign(platform: Platform, keywords: &[&str], groups: &[&str]) -> CampaignConfig {
    CampaignConfig {
        platform,
        status: CampaignStatus::Active,
        keywords: keywords.iter().map(ToString::to_string).collect(),
        target_groups: groups.iter().map(ToString::to_string).collect(),
    }
}

fn business(name: &str, campaigns: Vec<CampaignConfig>) -> BusinessConfig {
    BusinessConfig {
        name: name.to_string(),
        business_type: "venue".to_string(),
        core_offering: "Team-building bocce nights for groups".to_string(),
        preferred_tone: Tone::Casual,
        contact: Some("hello@example.com".to_string()),
        location: Some("Chicago".to_string()),
        campaigns,
    }
}

#[test]
fn keywords_are_an_ordered_set() {
    let c = campaign(
        Platform::Reddit,
        &["bocce", "  Team Building ", "BOCCE", "", "team building"],
        &[],
    );
    assert_eq!(c.normalized_keywords(), vec!["bocce", "Team Building"]);
}

#[test]
fn subreddit_prefixes_are_stripped() {
    let c = campaign(Platform::Reddit, &[], &["r/chicago", "/r/AskChicago", "chicago"]);
    assert_eq!(c.normalized_target_groups(), vec!["chicago", "AskChicago"]);
}

#[test]
fn validate_rejects_empty_name() {
    let file = BusinessesFile {
        businesses: vec![business("  ", vec![])],
    };
    let err = validate_businesses(&file).unwrap_err();
    assert!(err.to_string().contains("non-empty"));
}

#[test]
fn validate_rejects_duplicate_names_case_insensitively() {
    let file = BusinessesFile {
        businesses: vec![business("Bocce Bar", vec![]), business("bocce bar", vec![])],
    };
    let err = validate_businesses(&file).unwrap_err();
    assert!(err.to_string().contains("duplicate business name"));
}

#[test]
fn validate_rejects_two_campaigns_on_one_platform() {
    let file = BusinessesFile {
        businesses: vec![business(
            "Bocce Bar",
            vec![
                campaign(Platform::Reddit, &["bocce"], &["chicago"]),
                campaign(Platform::Reddit, &["bowling"], &["chicago"]),
            ],
        )],
    };
    let err = validate_businesses(&file).unwrap_err();
    assert!(err.to_string().contains("more than one reddit campaign"));
}

#[test]
fn validate_rejects_non_url_alert_feed() {
    let file = BusinessesFile {
        businesses: vec![business(
            "Bocce Bar",
            vec![campaign(Platform::GoogleAlerts, &[], &["not a url"])],
        )],
    };
    let err = validate_businesses(&file).unwrap_err();
    assert!(err.to_string().contains("not an http(s) feed URL"));
}

#[test]
fn parse_yaml_with_defaults() {
    let yaml = r"
businesses:
  - name: Bocce Bar
    type: venue
    core_offering: Team-building bocce nights for groups
    contact: hello@example.com
    location: Chicago
    campaigns:
      - platform: reddit
        keywords: [bocce, team building]
        target_groups: [chicago]
      - platform: google_alerts
        target_groups:
          - https://www.google.com/alerts/feeds/123/456
";
    let file: BusinessesFile = serde_yaml::from_str(yaml).unwrap();
    validate_businesses(&file).unwrap();
    let b = &file.businesses[0];
    assert_eq!(b.preferred_tone, Tone::Helpful);
    assert_eq!(b.campaigns.len(), 2);
    assert_eq!(b.campaigns[0].status, CampaignStatus::Active);
    assert!(b.campaigns[1].keywords.is_empty());
}

#[test]
fn load_missing_file_is_io_error() {
    let err = load_businesses(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::BusinessesFileIo { .. }));
}

#[test]
fn load_bundled_example_file() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/businesses.yaml");
    let file = load_businesses(&path).expect("bundled businesses.yaml should validate");
    assert!(!file.businesses.is_empty());
}
