//! Lead pipeline: dedup ledger, keyword gate, AI evaluation, notification
//! dispatch, operator actions, rate limiting and the onboarding wizard.
//!
//! Everything here talks to the outside world through the ports in
//! `replyhound-core`, so the in-memory adapters in [`memory`] can stand in
//! for Postgres and Telegram in tests and local runs.

pub mod dispatch;
pub mod error;
pub mod gate;
pub mod guidance;
pub mod ledger;
pub mod memory;
pub mod onboarding;
pub mod orchestrator;
pub mod ratelimit;

pub use dispatch::{Action, ActionRequest, Dispatcher, LeadNotice};
pub use error::PipelineError;
pub use gate::EmptyKeywordPolicy;
pub use ledger::Ledger;
pub use onboarding::{InMemorySessionStore, SessionStore, Wizard, WizardReply};
pub use orchestrator::{
    platform_for_url, BatchSummary, EntryPath, EvaluateOptions, Outcome, Pipeline,
    PipelineSettings, Thresholds,
};
pub use ratelimit::{LimiterRule, RateLimiter};
