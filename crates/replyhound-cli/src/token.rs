//! Bookmarklet token minting.

use chrono::Utc;
use replyhound_core::{AppConfig, Business, ScanTokens};
use sqlx::PgPool;

/// Print a scan token for `chat` and each selected business.
///
/// Tokens stay valid for the current and the next signing window.
///
/// # Errors
///
/// Returns an error if the requested business does not exist or a query
/// fails.
pub(crate) async fn run_token(
    pool: &PgPool,
    config: &AppConfig,
    chat: &str,
    business_id: Option<i64>,
) -> anyhow::Result<()> {
    let chat = chat.trim();
    if chat.is_empty() {
        anyhow::bail!("--chat must not be empty");
    }

    let businesses = match business_id {
        Some(id) => vec![replyhound_db::get_business(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("business {id} not found"))?],
        None => replyhound_db::list_businesses(pool).await?,
    };
    if businesses.is_empty() {
        println!("no businesses found; run `db seed` first");
        return Ok(());
    }

    let tokens = ScanTokens::from_app_config(config);
    for line in token_lines(&tokens, chat, &businesses) {
        println!("{line}");
    }
    if let Some(base) = &config.public_base_url {
        println!("scan endpoint: {}/api/v1/scan", base.trim_end_matches('/'));
    }
    Ok(())
}

fn token_lines(tokens: &ScanTokens, chat: &str, businesses: &[Business]) -> Vec<String> {
    let now = Utc::now();
    businesses
        .iter()
        .map(|b| format!("{:<6}{:<28}{}", b.id, b.name, tokens.issue(chat, b.id, now)))
        .collect()
}
