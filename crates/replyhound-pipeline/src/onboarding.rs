//! Conversational onboarding and admin wizards.
//!
//! User flow: `Name → Offering → Contact → Location → Keywords → create`.
//! Admin flow: `AdminMenu → RemoveSelect → RemoveConfirm` or
//! `AdminMenu → UpdateSelect → UpdateField → UpdateValue`.
//!
//! Sessions are keyed per chat and expire after a TTL of inactivity. While a
//! session is live, any `/command` other than `/skip`, `/back` and `/cancel`
//! ends the wizard and is left for normal command handling.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use replyhound_core::{BusinessField, LeadStore, NewBusiness, Platform, StoreError};
use tokio::sync::Mutex;

use crate::error::PipelineError;

const DEFAULT_BUSINESS_TYPE: &str = "local business";
const MIN_PHONE_DIGITS: usize = 7;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    Name,
    Offering,
    Contact,
    Location,
    Keywords,
    AdminMenu,
    RemoveSelect,
    RemoveConfirm { business_id: i64, name: String },
    UpdateSelect,
    UpdateField { business_id: i64 },
    UpdateValue { business_id: i64, field: BusinessField },
}

impl WizardStep {
    fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Offering => Some(WizardStep::Name),
            WizardStep::Contact => Some(WizardStep::Offering),
            WizardStep::Location => Some(WizardStep::Contact),
            WizardStep::Keywords => Some(WizardStep::Location),
            WizardStep::RemoveSelect | WizardStep::UpdateSelect => Some(WizardStep::AdminMenu),
            WizardStep::RemoveConfirm { .. } => Some(WizardStep::RemoveSelect),
            WizardStep::UpdateField { .. } => Some(WizardStep::UpdateSelect),
            WizardStep::UpdateValue { business_id, .. } => Some(WizardStep::UpdateField {
                business_id: *business_id,
            }),
            WizardStep::Name | WizardStep::AdminMenu => None,
        }
    }

    const fn skippable(&self) -> bool {
        matches!(self, WizardStep::Contact | WizardStep::Location)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub step: WizardStep,
    pub draft: NewBusiness,
    /// Businesses listed by the last selection prompt, in display order.
    pub choices: Vec<(i64, String)>,
    pub touched_at: DateTime<Utc>,
}

impl Session {
    fn new(step: WizardStep, now: DateTime<Utc>) -> Self {
        Self {
            step,
            draft: NewBusiness::default(),
            choices: Vec::new(),
            touched_at: now,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let idle = (now - self.touched_at).to_std().unwrap_or_default();
        idle >= ttl
    }
}

/// Wizard session storage keyed by chat id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, chat: &str) -> Result<Option<Session>, StoreError>;

    async fn put(&self, chat: &str, session: Session) -> Result<(), StoreError>;

    async fn remove(&self, chat: &str) -> Result<(), StoreError>;

    /// Drop sessions idle for at least `ttl`. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, chat: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().await.get(chat).cloned())
    }

    async fn put(&self, chat: &str, session: Session) -> Result<(), StoreError> {
        self.sessions.lock().await.insert(chat.to_string(), session);
        Ok(())
    }

    async fn remove(&self, chat: &str) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(chat);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, ttl));
        Ok(before - sessions.len())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn longest_digit_run(text: &str) -> usize {
    let mut best = 0;
    let mut run = 0;
    for c in text.chars() {
        if c.is_ascii_digit() {
            run += 1;
            best = best.max(run);
        } else if !matches!(c, ' ' | '-' | '.' | '(' | ')' | '+') {
            run = 0;
        }
    }
    best
}

#[must_use]
pub fn valid_name(text: &str) -> bool {
    text.trim().chars().count() >= 2
}

#[must_use]
pub fn valid_offering(text: &str) -> bool {
    text.trim().chars().count() >= 10
}

/// An email, a phone number (7+ digits, separators ignored) or a URL.
#[must_use]
pub fn valid_contact(text: &str) -> bool {
    let text = text.trim();
    text.contains('@')
        || longest_digit_run(text) >= MIN_PHONE_DIGITS
        || text.to_ascii_lowercase().contains("http")
}

#[must_use]
pub fn valid_location(text: &str) -> bool {
    text.trim().chars().count() >= 2
}

/// Comma-separated keywords of 2+ characters, de-duplicated case-insensitively.
#[must_use]
pub fn parse_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for kw in text.split(',').map(str::trim) {
        if kw.chars().count() >= 2 && !keywords.iter().any(|k| k.eq_ignore_ascii_case(kw)) {
            keywords.push(kw.to_string());
        }
    }
    keywords
}

fn parse_field(text: &str) -> Option<BusinessField> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "name" => Some(BusinessField::Name),
        "2" | "offering" => Some(BusinessField::Offering),
        "3" | "contact" => Some(BusinessField::Contact),
        "4" | "location" => Some(BusinessField::Location),
        "5" | "keywords" => Some(BusinessField::Keywords),
        _ => None,
    }
}

fn field_is_valid(field: BusinessField, value: &str) -> bool {
    match field {
        BusinessField::Name => valid_name(value),
        BusinessField::Offering => valid_offering(value),
        BusinessField::Contact => valid_contact(value),
        BusinessField::Location => valid_location(value),
        BusinessField::Keywords => !parse_keywords(value).is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn prompt_for(step: &WizardStep, choices: &[(i64, String)]) -> String {
    match step {
        WizardStep::Name => "What is your business called?".to_string(),
        WizardStep::Offering => {
            "What do you offer? One or two sentences (at least 10 characters).".to_string()
        }
        WizardStep::Contact => {
            "How can customers reach you? An email, phone number or website. /skip to leave it out."
                .to_string()
        }
        WizardStep::Location => {
            "Where are you located? A city or area. /skip to leave it out.".to_string()
        }
        WizardStep::Keywords => {
            "Which keywords should I watch for? Separate them with commas, e.g. bocce, team building."
                .to_string()
        }
        WizardStep::AdminMenu => {
            "Admin menu:\n1. Remove a business\n2. Update a business".to_string()
        }
        WizardStep::RemoveSelect => format!("Which business should be removed?\n{}", list(choices)),
        WizardStep::RemoveConfirm { name, .. } => {
            format!("Delete {name} with all its campaigns and leads? Reply yes or no.")
        }
        WizardStep::UpdateSelect => format!("Which business should be updated?\n{}", list(choices)),
        WizardStep::UpdateField { .. } => {
            "Which field?\n1. name\n2. offering\n3. contact\n4. location\n5. keywords".to_string()
        }
        WizardStep::UpdateValue { field, .. } => format!("Send the new {}.", field.as_str()),
    }
}

fn retry_hint(step: &WizardStep) -> &'static str {
    match step {
        WizardStep::Name => "The name needs at least 2 characters.",
        WizardStep::Offering => "Please describe your offering in at least 10 characters.",
        WizardStep::Contact => "That doesn't look like an email, phone number or website.",
        WizardStep::Location => "The location needs at least 2 characters.",
        WizardStep::Keywords => "Send at least one keyword of 2 or more characters.",
        WizardStep::AdminMenu => "Reply 1 or 2.",
        WizardStep::RemoveSelect | WizardStep::UpdateSelect => "Reply with a number from the list.",
        WizardStep::RemoveConfirm { .. } => "Reply yes or no.",
        WizardStep::UpdateField { .. } => "Reply with a field name or number.",
        WizardStep::UpdateValue { .. } => "That value isn't valid for this field.",
    }
}

fn list(choices: &[(i64, String)]) -> String {
    choices
        .iter()
        .enumerate()
        .map(|(i, (_, name))| format!("{}. {name}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn pick(choices: &[(i64, String)], text: &str) -> Option<(i64, String)> {
    let text = text.trim();
    if let Ok(n) = text.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| choices.get(i)).cloned();
    }
    choices
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(text))
        .cloned()
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardReply {
    /// The wizard consumed the message; send this text back.
    Reply(String),
    /// Not a wizard message; handle it as a normal command or text.
    NotHandled,
}

pub struct Wizard {
    sessions: Arc<dyn SessionStore>,
    store: Arc<dyn LeadStore>,
    ttl: Duration,
}

impl Wizard {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, store: Arc<dyn LeadStore>, ttl: Duration) -> Self {
        Self {
            sessions,
            store,
            ttl,
        }
    }

    /// Begin the user onboarding flow, replacing any live session.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the session store.
    pub async fn start_onboarding(
        &self,
        chat: &str,
        now: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        let session = Session::new(WizardStep::Name, now);
        self.sessions.put(chat, session).await?;
        Ok(format!(
            "Let's set up your business. /cancel at any time.\n\n{}",
            prompt_for(&WizardStep::Name, &[])
        ))
    }

    /// Begin the admin flow, replacing any live session.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the session store.
    pub async fn start_admin(
        &self,
        chat: &str,
        now: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        self.sessions
            .put(chat, Session::new(WizardStep::AdminMenu, now))
            .await?;
        Ok(prompt_for(&WizardStep::AdminMenu, &[]))
    }

    /// Remove idle sessions.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the session store.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        Ok(self.sessions.sweep(now, self.ttl).await?)
    }

    /// Feed one incoming message to the chat's wizard session, if any.
    ///
    /// # Errors
    ///
    /// Propagates store failures. Invalid answers are not errors: they
    /// re-prompt.
    pub async fn handle(
        &self,
        chat: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<WizardReply, PipelineError> {
        let Some(mut session) = self.sessions.get(chat).await? else {
            return Ok(WizardReply::NotHandled);
        };
        if session.is_expired(now, self.ttl) {
            self.sessions.remove(chat).await?;
            return Ok(WizardReply::NotHandled);
        }

        let text = text.trim();
        if text.starts_with('/') {
            let command = text.split_whitespace().next().unwrap_or(text);
            let command = command.split('@').next().unwrap_or(command);
            return self.command(chat, session, command, now).await;
        }

        session.touched_at = now;
        let reply = self.answer(&mut session, text).await?;
        match reply {
            Step::Continue(message) => {
                self.sessions.put(chat, session).await?;
                Ok(WizardReply::Reply(message))
            }
            Step::Done(message) => {
                self.sessions.remove(chat).await?;
                Ok(WizardReply::Reply(message))
            }
        }
    }

    async fn command(
        &self,
        chat: &str,
        mut session: Session,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<WizardReply, PipelineError> {
        match command {
            "/cancel" => {
                self.sessions.remove(chat).await?;
                Ok(WizardReply::Reply("Cancelled. Nothing was saved.".to_string()))
            }
            "/skip" if session.step.skippable() => {
                session.touched_at = now;
                let next = match session.step {
                    WizardStep::Contact => {
                        session.draft.contact = None;
                        WizardStep::Location
                    }
                    _ => {
                        session.draft.location = None;
                        WizardStep::Keywords
                    }
                };
                let message = prompt_for(&next, &session.choices);
                session.step = next;
                self.sessions.put(chat, session).await?;
                Ok(WizardReply::Reply(message))
            }
            "/skip" => Ok(WizardReply::Reply(format!(
                "This step can't be skipped.\n{}",
                prompt_for(&session.step, &session.choices)
            ))),
            "/back" => {
                session.touched_at = now;
                if let Some(previous) = session.step.previous() {
                    session.step = previous;
                }
                let message = prompt_for(&session.step, &session.choices);
                self.sessions.put(chat, session).await?;
                Ok(WizardReply::Reply(message))
            }
            _ => {
                self.sessions.remove(chat).await?;
                Ok(WizardReply::NotHandled)
            }
        }
    }

    async fn answer(&self, session: &mut Session, text: &str) -> Result<Step, PipelineError> {
        let next = match session.step.clone() {
            WizardStep::Name => {
                if !valid_name(text) {
                    return Ok(reprompt(session));
                }
                session.draft.name = text.to_string();
                WizardStep::Offering
            }
            WizardStep::Offering => {
                if !valid_offering(text) {
                    return Ok(reprompt(session));
                }
                session.draft.core_offering = text.to_string();
                WizardStep::Contact
            }
            WizardStep::Contact => {
                if !valid_contact(text) {
                    return Ok(reprompt(session));
                }
                session.draft.contact = Some(text.to_string());
                WizardStep::Location
            }
            WizardStep::Location => {
                if !valid_location(text) {
                    return Ok(reprompt(session));
                }
                session.draft.location = Some(text.to_string());
                WizardStep::Keywords
            }
            WizardStep::Keywords => {
                let keywords = parse_keywords(text);
                if keywords.is_empty() {
                    return Ok(reprompt(session));
                }
                return self.create(session, keywords).await;
            }
            WizardStep::AdminMenu => {
                let next = match text.to_ascii_lowercase().as_str() {
                    "1" | "remove" => WizardStep::RemoveSelect,
                    "2" | "update" => WizardStep::UpdateSelect,
                    _ => return Ok(reprompt(session)),
                };
                session.choices = self
                    .store
                    .list_businesses()
                    .await?
                    .into_iter()
                    .map(|b| (b.id, b.name))
                    .collect();
                if session.choices.is_empty() {
                    return Ok(Step::Done("There are no businesses yet.".to_string()));
                }
                next
            }
            WizardStep::RemoveSelect => {
                let Some((business_id, name)) = pick(&session.choices, text) else {
                    return Ok(reprompt(session));
                };
                WizardStep::RemoveConfirm { business_id, name }
            }
            WizardStep::RemoveConfirm { business_id, name } => {
                return match text.to_ascii_lowercase().as_str() {
                    "yes" | "y" => {
                        let deleted = self.store.delete_business(business_id).await?;
                        tracing::info!(business_id, deleted, "onboarding: business removed");
                        Ok(Step::Done(if deleted {
                            format!("Deleted {name}.")
                        } else {
                            format!("{name} was already gone.")
                        }))
                    }
                    "no" | "n" => Ok(Step::Done(format!("Kept {name}."))),
                    _ => Ok(reprompt(session)),
                };
            }
            WizardStep::UpdateSelect => {
                let Some((business_id, _)) = pick(&session.choices, text) else {
                    return Ok(reprompt(session));
                };
                WizardStep::UpdateField { business_id }
            }
            WizardStep::UpdateField { business_id } => {
                let Some(field) = parse_field(text) else {
                    return Ok(reprompt(session));
                };
                WizardStep::UpdateValue { business_id, field }
            }
            WizardStep::UpdateValue { business_id, field } => {
                if !field_is_valid(field, text) {
                    return Ok(reprompt(session));
                }
                let value = if field == BusinessField::Keywords {
                    parse_keywords(text).join(",")
                } else {
                    text.to_string()
                };
                let updated = self
                    .store
                    .update_business_field(business_id, field, &value)
                    .await?;
                return Ok(Step::Done(if updated {
                    format!("Updated {}.", field.as_str())
                } else {
                    "Nothing was updated.".to_string()
                }));
            }
        };

        let message = prompt_for(&next, &session.choices);
        session.step = next;
        Ok(Step::Continue(message))
    }

    async fn create(
        &self,
        session: &Session,
        keywords: Vec<String>,
    ) -> Result<Step, PipelineError> {
        let new = NewBusiness {
            business_type: DEFAULT_BUSINESS_TYPE.to_string(),
            platform: Some(Platform::Facebook),
            keywords,
            ..session.draft.clone()
        };
        match self.store.create_business_with_campaign(&new).await {
            Ok(business) => {
                tracing::info!(business_id = business.id, "onboarding: business created");
                Ok(Step::Done(format!(
                    "✅ {} is set up. Send /token to get your scan link.",
                    business.name
                )))
            }
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!(reason = %reason, "onboarding: create rejected");
                Ok(Step::Done(
                    "That business could not be created (is the name already taken?). \
                     Send /onboard to try again."
                        .to_string(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }
}

enum Step {
    Continue(String),
    Done(String),
}

fn reprompt(session: &Session) -> Step {
    Step::Continue(format!(
        "{}\n{}",
        retry_hint(&session.step),
        prompt_for(&session.step, &session.choices)
    ))
}

#[cfg(test)]
#[path = "onboarding_test.rs"]
mod tests;
