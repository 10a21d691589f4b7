use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if required vars are missing or values are invalid.
#[allow(clippy::too_many_lines)]
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_intent = |var: &str, default: &str| -> Result<u8, ConfigError> {
        let value = or_default(var, default)
            .parse::<u8>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if (1..=10).contains(&value) {
            Ok(value)
        } else {
            Err(invalid(var, format!("must be within 1..=10, got {value}")))
        }
    };

    let database_url = require("DATABASE_URL")?;
    let scan_token_secret = require("REPLYHOUND_SCAN_TOKEN_SECRET")?;

    let env = parse_environment(&or_default("REPLYHOUND_ENV", "development"));
    let bind_addr = parse_addr("REPLYHOUND_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("REPLYHOUND_LOG_LEVEL", "info");
    let businesses_path = PathBuf::from(or_default(
        "REPLYHOUND_BUSINESSES_PATH",
        "./config/businesses.yaml",
    ));
    let scan_token_window_days = parse_u64("REPLYHOUND_SCAN_TOKEN_WINDOW_DAYS", "30")?;
    if scan_token_window_days == 0 {
        return Err(invalid(
            "REPLYHOUND_SCAN_TOKEN_WINDOW_DAYS",
            "must be greater than zero".to_string(),
        ));
    }

    let db_max_connections = parse_u32("REPLYHOUND_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("REPLYHOUND_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("REPLYHOUND_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let ai_api_key = optional("AI_API_KEY");
    let ai_base_url = or_default("AI_BASE_URL", "https://api.openai.com/v1");
    let ai_judge_model = or_default("AI_JUDGE_MODEL", "gpt-4o-mini");
    let ai_generator_model = or_default("AI_GENERATOR_MODEL", "gpt-4o");
    let ai_timeout_secs = parse_u64("AI_TIMEOUT_SECS", "30")?;
    let ai_max_retries = parse_u32("AI_MAX_RETRIES", "2")?;
    let ai_retry_backoff_base_ms = parse_u64("AI_RETRY_BACKOFF_BASE_MS", "1000")?;

    let auto_min_intent = parse_intent("REPLYHOUND_AUTO_MIN_INTENT", "7")?;
    let manual_min_intent = parse_intent("REPLYHOUND_MANUAL_MIN_INTENT", "5")?;
    let feedback_window = parse_usize("REPLYHOUND_FEEDBACK_WINDOW", "20")?;
    let self_echo_min_matches = parse_usize("REPLYHOUND_SELF_ECHO_MIN_MATCHES", "2")?;

    let reddit_poll_interval_secs = parse_u64("REPLYHOUND_REDDIT_POLL_INTERVAL_SECS", "300")?;
    let alerts_poll_interval_secs = parse_u64("REPLYHOUND_ALERTS_POLL_INTERVAL_SECS", "120")?;
    let reddit_startup_delay_secs = parse_u64("REPLYHOUND_REDDIT_STARTUP_DELAY_SECS", "20")?;
    let alerts_startup_delay_secs = parse_u64("REPLYHOUND_ALERTS_STARTUP_DELAY_SECS", "50")?;
    let inter_target_delay_ms = parse_u64("REPLYHOUND_INTER_TARGET_DELAY_MS", "5000")?;
    let sweep_interval_secs = parse_u64("REPLYHOUND_SWEEP_INTERVAL_SECS", "300")?;

    let direct_post_ttl_secs = parse_u64("REPLYHOUND_DIRECT_POST_TTL_SECS", "1800")?;
    let wizard_ttl_secs = parse_u64("REPLYHOUND_WIZARD_TTL_SECS", "3600")?;
    let scan_rate_max = parse_u32("REPLYHOUND_SCAN_RATE_MAX", "30")?;
    let scan_rate_window_secs = parse_u64("REPLYHOUND_SCAN_RATE_WINDOW_SECS", "60")?;
    let poll_rate_max = parse_u32("REPLYHOUND_POLL_RATE_MAX", "60")?;
    let poll_rate_window_secs = parse_u64("REPLYHOUND_POLL_RATE_WINDOW_SECS", "3600")?;

    let telegram_bot_token = optional("TELEGRAM_BOT_TOKEN");
    let telegram_chat_id = optional("TELEGRAM_CHAT_ID");
    let telegram_webhook_secret = optional("TELEGRAM_WEBHOOK_SECRET");
    let public_base_url = optional("REPLYHOUND_PUBLIC_BASE_URL");

    let reddit_user_agent = or_default(
        "REDDIT_USER_AGENT",
        "replyhound/0.1 (lead-monitor)",
    );
    let reddit_client_id = optional("REDDIT_CLIENT_ID");
    let reddit_client_secret = optional("REDDIT_CLIENT_SECRET");
    let reddit_username = optional("REDDIT_USERNAME");
    let reddit_password = optional("REDDIT_PASSWORD");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        businesses_path,
        scan_token_secret,
        scan_token_window_days,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        ai_api_key,
        ai_base_url,
        ai_judge_model,
        ai_generator_model,
        ai_timeout_secs,
        ai_max_retries,
        ai_retry_backoff_base_ms,
        auto_min_intent,
        manual_min_intent,
        feedback_window,
        self_echo_min_matches,
        reddit_poll_interval_secs,
        alerts_poll_interval_secs,
        reddit_startup_delay_secs,
        alerts_startup_delay_secs,
        inter_target_delay_ms,
        sweep_interval_secs,
        direct_post_ttl_secs,
        wizard_ttl_secs,
        scan_rate_max,
        scan_rate_window_secs,
        poll_rate_max,
        poll_rate_window_secs,
        telegram_bot_token,
        telegram_chat_id,
        telegram_webhook_secret,
        public_base_url,
        reddit_user_agent,
        reddit_client_id,
        reddit_client_secret,
        reddit_username,
        reddit_password,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
