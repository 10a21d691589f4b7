//! Fixtures shared by the server's unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use replyhound_core::config::build_app_config;
use replyhound_core::{AppConfig, BusinessContext, IntentVerdict, LeadModel, Messenger, ModelError};

use crate::state::{build_state, AppState, Backends, Transports};

/// Scores every post 8 and answers with a fixed reply.
pub struct FixedModel;

#[async_trait]
impl LeadModel for FixedModel {
    async fn score(&self, _: &BusinessContext, _: &str) -> Result<IntentVerdict, ModelError> {
        Ok(IntentVerdict {
            is_lead: true,
            intent_score: 8,
            reasoning: "asking for recommendations".to_string(),
        })
    }

    async fn generate(
        &self,
        _: &BusinessContext,
        _: &str,
        _: &str,
    ) -> Result<String, ModelError> {
        Ok(
            "We run indoor bocce leagues for groups of every size, happy to help you plan one."
                .to_string(),
        )
    }
}

pub fn config(extra: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), "postgres://unused".to_string()),
        (
            "REPLYHOUND_SCAN_TOKEN_SECRET".to_string(),
            "test-secret".to_string(),
        ),
    ]);
    for (k, v) in extra {
        vars.insert((*k).to_string(), (*v).to_string());
    }
    build_app_config(|key| vars.get(key).cloned().ok_or(std::env::VarError::NotPresent))
        .expect("test config should build")
}

/// In-memory state with [`FixedModel`] and no direct poster.
pub fn state_with(config: &AppConfig, messenger: Arc<dyn Messenger>) -> AppState {
    build_state(
        config,
        Backends::in_memory(),
        Transports {
            model: Arc::new(FixedModel),
            messenger,
            poster: None,
        },
    )
}
