//! Domain types shared by every replyhound crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Maximum number of characters of a post body kept on a persisted lead.
pub const ORIGINAL_POST_MAX_CHARS: usize = 2_000;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Reddit,
    Facebook,
    Linkedin,
    GoogleAlerts,
}

impl Platform {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
            Platform::GoogleAlerts => "google_alerts",
        }
    }

    /// Community platforms punish self-promotion: replies there may not name
    /// the business or include links.
    #[must_use]
    pub const fn is_community(self) -> bool {
        matches!(self, Platform::Reddit | Platform::Facebook)
    }

    /// Platforms where a reply can be posted programmatically.
    #[must_use]
    pub const fn supports_direct_post(self) -> bool {
        matches!(self, Platform::Reddit)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reddit" => Ok(Platform::Reddit),
            "facebook" => Ok(Platform::Facebook),
            "linkedin" => Ok(Platform::Linkedin),
            "google_alerts" | "google-alerts" | "alerts" => Ok(Platform::GoogleAlerts),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Empathetic,
    Professional,
    Casual,
    #[default]
    Helpful,
}

impl Tone {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Tone::Empathetic => "empathetic",
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Helpful => "helpful",
        }
    }

    /// One-line voice description used inside generation prompts.
    #[must_use]
    pub const fn voice(self) -> &'static str {
        match self {
            Tone::Empathetic => "warm and understanding, acknowledge how the person feels first",
            Tone::Professional => "clear, knowledgeable and courteous",
            Tone::Casual => "relaxed and conversational, like a friendly neighbour",
            Tone::Helpful => "practical and generous with concrete tips",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empathetic" => Ok(Tone::Empathetic),
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "helpful" => Ok(Tone::Helpful),
            other => Err(CoreError::UnknownTone(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Paused,
}

impl CampaignStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Matched,
    Responded,
    Pending,
}

impl LeadStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Matched => "matched",
            LeadStatus::Responded => "responded",
            LeadStatus::Pending => "pending",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "matched" => Ok(LeadStatus::Matched),
            "responded" => Ok(LeadStatus::Responded),
            "pending" => Ok(LeadStatus::Pending),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Pending,
    Approved,
}

impl ResponseStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Approved => "approved",
        }
    }
}

impl FromStr for ResponseStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResponseStatus::Pending),
            "approved" => Ok(ResponseStatus::Approved),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Positive,
    BadMatch,
    TooSalesy,
    WrongClient,
}

impl FeedbackKind {
    pub const ALL: [FeedbackKind; 4] = [
        FeedbackKind::Positive,
        FeedbackKind::BadMatch,
        FeedbackKind::TooSalesy,
        FeedbackKind::WrongClient,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Positive => "positive",
            FeedbackKind::BadMatch => "bad_match",
            FeedbackKind::TooSalesy => "too_salesy",
            FeedbackKind::WrongClient => "wrong_client",
        }
    }

    /// Button label shown to the operator.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FeedbackKind::Positive => "👍 Good",
            FeedbackKind::BadMatch => "❌ Bad match",
            FeedbackKind::TooSalesy => "💰 Too salesy",
            FeedbackKind::WrongClient => "🚫 Wrong client",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(FeedbackKind::Positive),
            "bad_match" => Ok(FeedbackKind::BadMatch),
            "too_salesy" => Ok(FeedbackKind::TooSalesy),
            "wrong_client" => Ok(FeedbackKind::WrongClient),
            other => Err(CoreError::UnknownFeedback(other.to_string())),
        }
    }
}

/// Where a candidate post came from. The string form is part of every dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Reddit,
    GoogleAlerts,
    Bookmarklet,
    Screenshot,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SourceKind::Reddit => "reddit",
            SourceKind::GoogleAlerts => "google_alerts",
            SourceKind::Bookmarklet => "bookmarklet",
            SourceKind::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub name: String,
    pub business_type: String,
    pub core_offering: String,
    pub preferred_tone: Tone,
    pub contact: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub business_id: i64,
    pub platform: Platform,
    pub status: CampaignStatus,
    /// Ordered, de-duplicated keyword list.
    pub keywords: Vec<String>,
    /// Subreddit names, group names, or feed URLs depending on platform.
    pub target_groups: Vec<String>,
}

impl Campaign {
    /// An unsaved campaign used for manual scans of a business that has no
    /// campaign on the scanned platform. Its id is `0`.
    #[must_use]
    pub fn ad_hoc(business_id: i64, platform: Platform) -> Self {
        Self {
            id: 0,
            business_id,
            platform,
            status: CampaignStatus::Active,
            keywords: Vec::new(),
            target_groups: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id > 0
    }
}

/// One business/campaign pair a poller iterates over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTarget {
    pub business: Business,
    pub campaign: Campaign,
}

/// The slice of a business the AI collaborator sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessContext {
    pub name: String,
    pub business_type: String,
    pub core_offering: String,
    pub tone: Tone,
    pub platform: Platform,
}

impl BusinessContext {
    #[must_use]
    pub fn new(business: &Business, platform: Platform) -> Self {
        Self {
            name: business.name.clone(),
            business_type: business.business_type.clone(),
            core_offering: business.core_offering.clone(),
            tone: business.preferred_tone,
            platform,
        }
    }
}

/// A normalized post pulled from any source, not yet scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCandidate {
    pub source: SourceKind,
    pub source_id: Option<String>,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub group_name: Option<String>,
    pub author_name: Option<String>,
    pub age_hint: Option<String>,
}

impl PostCandidate {
    /// Title and body joined, as scored and gated.
    #[must_use]
    pub fn text(&self) -> String {
        let title = self.title.trim();
        let body = self.body.trim();
        match (title.is_empty(), body.is_empty()) {
            (true, _) => body.to_string(),
            (false, true) => title.to_string(),
            (false, false) => format!("{title}\n\n{body}"),
        }
    }
}

/// Insert payload for a qualifying lead. Persisted with status `matched`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub business_id: i64,
    pub campaign_id: Option<i64>,
    pub platform: Platform,
    pub group_name: Option<String>,
    pub author_name: Option<String>,
    pub original_post: String,
    pub post_url: Option<String>,
    pub intent_score: u8,
}

impl NewLead {
    #[must_use]
    pub fn from_candidate(
        target: &MonitorTarget,
        candidate: &PostCandidate,
        intent_score: u8,
    ) -> Self {
        Self {
            business_id: target.business.id,
            campaign_id: target
                .campaign
                .is_persisted()
                .then_some(target.campaign.id),
            platform: target.campaign.platform,
            group_name: candidate.group_name.clone(),
            author_name: candidate.author_name.clone(),
            original_post: truncate_chars(&candidate.text(), ORIGINAL_POST_MAX_CHARS),
            post_url: candidate.link.clone(),
            intent_score,
        }
    }
}

/// Fields collected by the onboarding wizard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewBusiness {
    pub name: String,
    pub business_type: String,
    pub core_offering: String,
    pub preferred_tone: Tone,
    pub contact: Option<String>,
    pub location: Option<String>,
    pub platform: Option<Platform>,
    pub keywords: Vec<String>,
    pub target_groups: Vec<String>,
}

/// Truncate `s` to at most `max` characters.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        for p in [
            Platform::Reddit,
            Platform::Facebook,
            Platform::Linkedin,
            Platform::GoogleAlerts,
        ] {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
    }

    #[test]
    fn unknown_platform_is_rejected() {
        assert!(matches!(
            "myspace".parse::<Platform>(),
            Err(CoreError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn only_reddit_supports_direct_post() {
        assert!(Platform::Reddit.supports_direct_post());
        assert!(!Platform::GoogleAlerts.supports_direct_post());
        assert!(!Platform::Facebook.supports_direct_post());
    }

    #[test]
    fn feedback_kind_parses_wire_names() {
        for kind in FeedbackKind::ALL {
            assert_eq!(kind.as_str().parse::<FeedbackKind>().unwrap(), kind);
        }
    }

    #[test]
    fn candidate_text_joins_title_and_body() {
        let mut c = PostCandidate {
            source: SourceKind::Reddit,
            source_id: None,
            title: "Title".to_string(),
            body: "Body".to_string(),
            link: None,
            group_name: None,
            author_name: None,
            age_hint: None,
        };
        assert_eq!(c.text(), "Title\n\nBody");
        c.body.clear();
        assert_eq!(c.text(), "Title");
        c.title.clear();
        c.body = "only body".to_string();
        assert_eq!(c.text(), "only body");
    }

    #[test]
    fn truncate_chars_respects_multibyte_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
    }

    #[test]
    fn tone_serializes_lowercase() {
        let json = serde_json::to_string(&Tone::Empathetic).unwrap();
        assert_eq!(json, "\"empathetic\"");
    }
}
