//! Shared configuration, domain types, and collaborator ports for replyhound.

pub mod app_config;
pub mod businesses;
pub mod config;
pub mod error;
pub mod ports;
pub mod token;
pub mod types;

pub use app_config::{AppConfig, Environment};
pub use businesses::{load_businesses, BusinessConfig, BusinessesFile, CampaignConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, CoreError};
pub use ports::{
    BucketState, BucketStore, BusinessField, Button, ButtonKind, ButtonLayout, DeliveryError,
    IntentVerdict, LeadModel, LeadStore, Messenger, ModelError, PersistedLead, ReplyPoster,
    ResponseContext, SeenStore, StoreError,
};
pub use token::ScanTokens;
pub use types::{
    Business, BusinessContext, Campaign, CampaignStatus, FeedbackKind, LeadStatus, MonitorTarget,
    NewBusiness, NewLead, Platform, PostCandidate, ResponseStatus, SourceKind, Tone,
    ORIGINAL_POST_MAX_CHARS,
};
