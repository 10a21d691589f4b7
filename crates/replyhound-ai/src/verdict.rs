//! Strict validation of judge output and cleanup of generated replies.

use replyhound_core::IntentVerdict;
use serde::Deserialize;

use crate::error::AiError;

/// Wire shape of the judge's JSON. Field types are enforced by serde:
/// `"true"` is not a bool and `7.5` is not an integer.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    is_lead: bool,
    intent_score: i64,
    reasoning: String,
}

/// Strip a surrounding Markdown code fence (```` ```json ```` or ```` ``` ````).
#[must_use]
pub fn strip_code_blocks(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse judge output into a typed verdict.
///
/// # Errors
///
/// Returns [`AiError::Malformed`] when the text is not a JSON object with
/// `is_lead` (bool), `intent_score` (integer in `1..=10`) and `reasoning`
/// (string).
pub fn parse_verdict(raw: &str) -> Result<IntentVerdict, AiError> {
    let body = strip_code_blocks(raw);
    let parsed: RawVerdict =
        serde_json::from_str(body).map_err(|e| AiError::Malformed(format!("verdict: {e}")))?;

    let intent_score = u8::try_from(parsed.intent_score)
        .ok()
        .filter(|s| (1..=10).contains(s))
        .ok_or_else(|| {
            AiError::Malformed(format!(
                "intent_score {} outside 1..=10",
                parsed.intent_score
            ))
        })?;

    Ok(IntentVerdict {
        is_lead: parsed.is_lead,
        intent_score,
        reasoning: parsed.reasoning.trim().to_string(),
    })
}

const QUOTE_PAIRS: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];

/// Trim generated text and remove one layer of surrounding quotes.
///
/// # Errors
///
/// Returns [`AiError::Empty`] when nothing is left.
pub fn clean_reply(raw: &str) -> Result<String, AiError> {
    let mut text = raw.trim();
    for (open, close) in QUOTE_PAIRS {
        if text.chars().count() >= 2 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
            break;
        }
    }
    if text.is_empty() {
        return Err(AiError::Empty);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let v = parse_verdict(
            r#"{"is_lead": true, "intent_score": 8, "reasoning": " Asks for a venue. "}"#,
        )
        .unwrap();
        assert!(v.is_lead);
        assert_eq!(v.intent_score, 8);
        assert_eq!(v.reasoning, "Asks for a venue.");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"is_lead\": false, \"intent_score\": 2, \"reasoning\": \"no\"}\n```";
        let v = parse_verdict(raw).unwrap();
        assert!(!v.is_lead);
        assert_eq!(v.intent_score, 2);
    }

    #[test]
    fn rejects_wrong_types_and_ranges() {
        for raw in [
            r#"{"is_lead": "true", "intent_score": 8, "reasoning": "x"}"#,
            r#"{"is_lead": true, "intent_score": 7.5, "reasoning": "x"}"#,
            r#"{"is_lead": true, "intent_score": "8", "reasoning": "x"}"#,
            r#"{"is_lead": true, "intent_score": 0, "reasoning": "x"}"#,
            r#"{"is_lead": true, "intent_score": 11, "reasoning": "x"}"#,
            r#"{"is_lead": true, "intent_score": -3, "reasoning": "x"}"#,
            r#"{"is_lead": true, "reasoning": "x"}"#,
            "Sure! Here is my answer: 8/10",
        ] {
            assert!(
                matches!(parse_verdict(raw), Err(AiError::Malformed(_))),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn clean_reply_strips_quotes_and_whitespace() {
        assert_eq!(clean_reply("  \"Try bocce!\"  ").unwrap(), "Try bocce!");
        assert_eq!(clean_reply("“Try bocce!”").unwrap(), "Try bocce!");
        assert_eq!(
            clean_reply("\"Bocce\" is fun, try it").unwrap(),
            "\"Bocce\" is fun, try it"
        );
    }

    #[test]
    fn clean_reply_rejects_empty() {
        assert!(matches!(clean_reply("   "), Err(AiError::Empty)));
        assert!(matches!(clean_reply("\"\""), Err(AiError::Empty)));
    }

    #[test]
    fn strip_code_blocks_leaves_plain_text() {
        assert_eq!(strip_code_blocks("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
    }
}
