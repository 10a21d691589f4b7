//! Read-only listings.

use sqlx::PgPool;

const PREVIEW_CHARS: usize = 60;

/// Print every business with its active campaigns.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub(crate) async fn run_businesses(pool: &PgPool) -> anyhow::Result<()> {
    let businesses = replyhound_db::list_businesses(pool).await?;
    if businesses.is_empty() {
        println!("no businesses found; run `db seed` or onboard one over Telegram");
        return Ok(());
    }

    println!("{:<6}{:<28}{:<12}CAMPAIGNS", "ID", "NAME", "TONE");
    for business in &businesses {
        let campaigns = replyhound_db::active_campaigns_for_business(pool, business.id).await?;
        let summary = campaigns
            .iter()
            .map(|c| format!("{} ({} keywords)", c.platform, c.keywords.len()))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<6}{:<28}{:<12}{}",
            business.id,
            preview(&business.name, 26),
            business.preferred_tone.as_str(),
            if summary.is_empty() { "\u{2014}".to_string() } else { summary }
        );
    }
    Ok(())
}

/// Print the newest leads of one business.
///
/// # Errors
///
/// Returns an error if the business does not exist or a query fails.
pub(crate) async fn run_leads(pool: &PgPool, business_id: i64, limit: i64) -> anyhow::Result<()> {
    let business = replyhound_db::get_business(pool, business_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("business {business_id} not found"))?;

    let leads = replyhound_db::list_recent_leads(pool, business_id, limit).await?;
    if leads.is_empty() {
        println!("no leads yet for {}", business.name);
        return Ok(());
    }

    println!("Leads for {}", business.name);
    println!("{:<18}{:<15}{:<7}{:<11}POST", "CREATED", "PLATFORM", "SCORE", "STATUS");
    for lead in &leads {
        println!(
            "{:<18}{:<15}{:<7}{:<11}{}",
            lead.created_at.format("%Y-%m-%d %H:%M"),
            lead.platform,
            lead.intent_score,
            lead.status,
            preview(&lead.original_post, PREVIEW_CHARS)
        );
    }
    Ok(())
}

/// First `max` characters on one line, with `...` when cut.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        format!("{}...", flat.chars().take(max).collect::<String>())
    } else {
        flat
    }
}
