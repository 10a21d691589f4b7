//! Prompt construction for the intent judge and the reply generator.

use std::sync::LazyLock;

use regex::Regex;
use replyhound_core::{BusinessContext, Platform};

/// Acute-risk language. Matching either the business offering or the post
/// switches generation into the safety-first mode.
static CRISIS_TERMS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(suicid\w*|self[- ]?harm\w*|kill(ing)? (myself|themselves|himself|herself)|end(ing)? (my|their|his|her) life|want(ed)? to die|don'?t want to (live|be here)|overdos\w*|cutting myself|crisis (line|hotline|counsel\w*))\b",
    )
    .ok()
});

/// Appended after the platform rules; takes precedence over them.
pub const SAFETY_BLOCK: &str = "SAFETY OVERRIDE (takes precedence over every rule above):
- The post may involve someone at risk of harming themselves. Lead with care, not with any service.
- Do not promote the business. Do not give clinical advice or diagnose.
- Include this crisis resource, even on platforms where links are otherwise not allowed: \
in the US call or text 988 (988 Suicide & Crisis Lifeline, https://988lifeline.org); \
elsewhere, contact local emergency services.
- Keep it short, warm, and non-judgmental.";

/// `true` when the offering or the post mentions acute mental-health risk.
#[must_use]
pub fn needs_safety_block(offering: &str, post: &str) -> bool {
    CRISIS_TERMS
        .as_ref()
        .is_some_and(|re| re.is_match(offering) || re.is_match(post))
}

fn platform_label(platform: Platform) -> &'static str {
    match platform {
        Platform::Reddit => "a Reddit thread",
        Platform::Facebook => "a Facebook group",
        Platform::Linkedin => "LinkedIn",
        Platform::GoogleAlerts => "a public web page",
    }
}

/// Self-promotion rules for the platform the reply will appear on.
#[must_use]
pub fn platform_rules(business_name: &str, platform: Platform) -> String {
    if platform.is_community() {
        format!(
            "PLATFORM RULES ({platform}, a community space):
- Never mention \"{business_name}\" or any business by name.
- No links, URLs, phone numbers, emails or contact details.
- Write as a knowledgeable community member sharing genuine help.
- 2 to 4 sentences."
        )
    } else {
        format!(
            "PLATFORM RULES ({platform}, a public web-wide space):
- You may mention \"{business_name}\" at most once, naturally, where it genuinely helps.
- No hard sell, no calls to action, no links.
- Lead with useful information.
- 2 to 5 sentences."
        )
    }
}

/// System prompt for the intent judge. The post goes in the user message.
#[must_use]
pub fn judge_prompt(business: &BusinessContext) -> String {
    format!(
        "You qualify sales leads for a business.

BUSINESS
- Name: {name}
- Type: {kind}
- Offering: {offering}

Decide whether the post you are given comes from someone who could plausibly \
need this offering now. Score buying intent from 1 to 10:
- 1-3: unrelated, or only mentions the topic in passing
- 4-6: related interest, no clear need
- 7-8: describes a need the offering addresses
- 9-10: explicitly asking for a recommendation or provider like this one

Posts written by businesses advertising themselves are not leads.

Reply with a single JSON object and nothing else:
{{\"is_lead\": true|false, \"intent_score\": <integer 1-10>, \"reasoning\": \"<one sentence>\"}}",
        name = business.name,
        kind = business.business_type,
        offering = business.core_offering,
    )
}

/// System prompt for the reply generator. The post goes in the user message.
#[must_use]
pub fn generation_prompt(business: &BusinessContext, post: &str, guidance: &str) -> String {
    let mut prompt = format!(
        "You write a reply to a post found on {where_}.

BUSINESS CONTEXT
- Name: {name}
- Type: {kind}
- Offering: {offering}

VOICE
- Tone: {tone} ({voice}).
- Sound like a real person, not a brand. No hashtags, no emojis, no sign-off.

{rules}",
        where_ = platform_label(business.platform),
        name = business.name,
        kind = business.business_type,
        offering = business.core_offering,
        tone = business.tone,
        voice = business.tone.voice(),
        rules = platform_rules(&business.name, business.platform),
    );

    let guidance = guidance.trim();
    if !guidance.is_empty() {
        prompt.push_str("\n\nOPERATOR FEEDBACK\n");
        prompt.push_str(guidance);
    }

    if needs_safety_block(&business.core_offering, post) {
        prompt.push_str("\n\n");
        prompt.push_str(SAFETY_BLOCK);
    }

    prompt.push_str("\n\nReturn only the reply text.");
    prompt
}
