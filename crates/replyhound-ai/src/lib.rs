//! AI judge and reply generator for replyhound.
//!
//! [`OpenAiLeadModel`] implements [`replyhound_core::LeadModel`] against any
//! OpenAI-compatible `chat/completions` endpoint. Model output is validated
//! strictly ([`parse_verdict`], [`clean_reply`]) and every call can be
//! wrapped in [`call_with_policy`] for timeout and transient-error retries.

pub mod client;
pub mod error;
pub mod model;
pub mod prompts;
pub mod retry;
pub mod verdict;

pub use client::{ChatClient, ChatMessage, ChatRequest};
pub use error::AiError;
pub use model::OpenAiLeadModel;
pub use prompts::{generation_prompt, judge_prompt, needs_safety_block};
pub use retry::{call_with_policy, CallPolicy};
pub use verdict::{clean_reply, parse_verdict, strip_code_blocks};
