use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub businesses_path: PathBuf,
    pub scan_token_secret: String,
    pub scan_token_window_days: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub ai_api_key: Option<String>,
    pub ai_base_url: String,
    pub ai_judge_model: String,
    pub ai_generator_model: String,
    pub ai_timeout_secs: u64,
    pub ai_max_retries: u32,
    pub ai_retry_backoff_base_ms: u64,

    pub auto_min_intent: u8,
    pub manual_min_intent: u8,
    pub feedback_window: usize,
    pub self_echo_min_matches: usize,

    pub reddit_poll_interval_secs: u64,
    pub alerts_poll_interval_secs: u64,
    pub reddit_startup_delay_secs: u64,
    pub alerts_startup_delay_secs: u64,
    pub inter_target_delay_ms: u64,
    pub sweep_interval_secs: u64,

    pub direct_post_ttl_secs: u64,
    pub wizard_ttl_secs: u64,
    pub scan_rate_max: u32,
    pub scan_rate_window_secs: u64,
    pub poll_rate_max: u32,
    pub poll_rate_window_secs: u64,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_webhook_secret: Option<String>,
    pub public_base_url: Option<String>,

    pub reddit_user_agent: String,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_username: Option<String>,
    pub reddit_password: Option<String>,
}

impl AppConfig {
    /// Whether Reddit credentials for posting replies directly are present.
    #[must_use]
    pub fn reddit_posting_configured(&self) -> bool {
        self.reddit_client_id.is_some()
            && self.reddit_client_secret.is_some()
            && self.reddit_username.is_some()
            && self.reddit_password.is_some()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("businesses_path", &self.businesses_path)
            .field("database_url", &"[redacted]")
            .field("scan_token_secret", &"[redacted]")
            .field("scan_token_window_days", &self.scan_token_window_days)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("ai_api_key", &redact(&self.ai_api_key))
            .field("ai_base_url", &self.ai_base_url)
            .field("ai_judge_model", &self.ai_judge_model)
            .field("ai_generator_model", &self.ai_generator_model)
            .field("ai_timeout_secs", &self.ai_timeout_secs)
            .field("ai_max_retries", &self.ai_max_retries)
            .field("ai_retry_backoff_base_ms", &self.ai_retry_backoff_base_ms)
            .field("auto_min_intent", &self.auto_min_intent)
            .field("manual_min_intent", &self.manual_min_intent)
            .field("feedback_window", &self.feedback_window)
            .field("self_echo_min_matches", &self.self_echo_min_matches)
            .field("reddit_poll_interval_secs", &self.reddit_poll_interval_secs)
            .field("alerts_poll_interval_secs", &self.alerts_poll_interval_secs)
            .field("reddit_startup_delay_secs", &self.reddit_startup_delay_secs)
            .field("alerts_startup_delay_secs", &self.alerts_startup_delay_secs)
            .field("inter_target_delay_ms", &self.inter_target_delay_ms)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("direct_post_ttl_secs", &self.direct_post_ttl_secs)
            .field("wizard_ttl_secs", &self.wizard_ttl_secs)
            .field("scan_rate_max", &self.scan_rate_max)
            .field("scan_rate_window_secs", &self.scan_rate_window_secs)
            .field("poll_rate_max", &self.poll_rate_max)
            .field("poll_rate_window_secs", &self.poll_rate_window_secs)
            .field("telegram_bot_token", &redact(&self.telegram_bot_token))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field(
                "telegram_webhook_secret",
                &redact(&self.telegram_webhook_secret),
            )
            .field("public_base_url", &self.public_base_url)
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("reddit_client_id", &self.reddit_client_id)
            .field("reddit_client_secret", &redact(&self.reddit_client_secret))
            .field("reddit_username", &self.reddit_username)
            .field("reddit_password", &redact(&self.reddit_password))
            .finish()
    }
}
