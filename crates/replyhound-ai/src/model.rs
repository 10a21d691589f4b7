//! [`LeadModel`] backed by an OpenAI-compatible endpoint.

use async_trait::async_trait;
use replyhound_core::{AppConfig, BusinessContext, IntentVerdict, LeadModel, ModelError};

use crate::client::{ChatClient, ChatMessage, ChatRequest};
use crate::error::AiError;
use crate::prompts::{generation_prompt, judge_prompt};
use crate::verdict::{clean_reply, parse_verdict};

const JUDGE_TEMPERATURE: f32 = 0.1;
const GENERATOR_TEMPERATURE: f32 = 0.8;
const JUDGE_MAX_TOKENS: u32 = 300;
const GENERATOR_MAX_TOKENS: u32 = 400;

#[derive(Debug, Clone)]
pub struct OpenAiLeadModel {
    client: ChatClient,
    judge_model: String,
    generator_model: String,
}

impl OpenAiLeadModel {
    #[must_use]
    pub fn new(client: ChatClient, judge_model: &str, generator_model: &str) -> Self {
        Self {
            client,
            judge_model: judge_model.to_string(),
            generator_model: generator_model.to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns [`AiError::Config`] when `AI_API_KEY` is unset, or
    /// [`AiError::Http`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, AiError> {
        let api_key = config
            .ai_api_key
            .as_deref()
            .ok_or_else(|| AiError::Config("AI_API_KEY is not set".to_string()))?;
        let client =
            ChatClient::with_base_url(api_key, &config.ai_base_url, config.ai_timeout_secs)?;
        Ok(Self::new(
            client,
            &config.ai_judge_model,
            &config.ai_generator_model,
        ))
    }

    async fn judge(
        &self,
        business: &BusinessContext,
        post: &str,
    ) -> Result<IntentVerdict, AiError> {
        let request = ChatRequest::new(
            &self.judge_model,
            vec![
                ChatMessage::system(judge_prompt(business)),
                ChatMessage::user(post),
            ],
            JUDGE_TEMPERATURE,
        )
        .json_object()
        .max_tokens(JUDGE_MAX_TOKENS);

        let raw = self.client.complete(&request).await?;
        parse_verdict(&raw)
    }

    async fn write_reply(
        &self,
        business: &BusinessContext,
        post: &str,
        guidance: &str,
    ) -> Result<String, AiError> {
        let request = ChatRequest::new(
            &self.generator_model,
            vec![
                ChatMessage::system(generation_prompt(business, post, guidance)),
                ChatMessage::user(post),
            ],
            GENERATOR_TEMPERATURE,
        )
        .max_tokens(GENERATOR_MAX_TOKENS);

        let raw = self.client.complete(&request).await?;
        clean_reply(&raw)
    }
}

#[async_trait]
impl LeadModel for OpenAiLeadModel {
    async fn score(
        &self,
        business: &BusinessContext,
        post: &str,
    ) -> Result<IntentVerdict, ModelError> {
        self.judge(business, post).await.map_err(ModelError::from)
    }

    async fn generate(
        &self,
        business: &BusinessContext,
        post: &str,
        guidance: &str,
    ) -> Result<String, ModelError> {
        self.write_reply(business, post, guidance)
            .await
            .map_err(ModelError::from)
    }
}
