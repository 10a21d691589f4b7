//! Bookmarklet scan tokens.
//!
//! A token is the hex HMAC-SHA256 of `"{chat_id}:{business_id}:{window}"`,
//! where `window` is the number of whole token windows since the Unix epoch.
//! Tokens from the current and the previous window verify, so a token stays
//! valid for at least one full window after it was minted.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::app_config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

const SECS_PER_DAY: u64 = 86_400;

#[derive(Clone)]
pub struct ScanTokens {
    secret: Vec<u8>,
    window_secs: i64,
}

impl std::fmt::Debug for ScanTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanTokens")
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

impl ScanTokens {
    #[must_use]
    pub fn new(secret: &str, window_days: u64) -> Self {
        let window_secs = window_days.max(1).saturating_mul(SECS_PER_DAY);
        Self {
            secret: secret.as_bytes().to_vec(),
            window_secs: i64::try_from(window_secs).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(&config.scan_token_secret, config.scan_token_window_days)
    }

    #[must_use]
    pub fn window(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(self.window_secs)
    }

    fn sign(&self, chat_id: &str, business_id: i64, window: i64) -> String {
        // HMAC takes keys of any length; the error arm is unreachable.
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return String::new();
        };
        mac.update(format!("{chat_id}:{business_id}:{window}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Mint the token for the current window.
    #[must_use]
    pub fn issue(&self, chat_id: &str, business_id: i64, now: DateTime<Utc>) -> String {
        self.sign(chat_id, business_id, self.window(now))
    }

    /// Constant-time check against the current and previous window.
    #[must_use]
    pub fn verify(&self, chat_id: &str, business_id: i64, token: &str, now: DateTime<Utc>) -> bool {
        let token = token.trim().to_ascii_lowercase();
        let current = self.window(now);
        [current, current - 1].into_iter().any(|window| {
            let expected = self.sign(chat_id, business_id, window);
            !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(token.as_bytes()))
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const DAY: i64 = 86_400;

    fn at(days: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(days * DAY, 0).unwrap()
    }

    #[test]
    fn token_is_hex_sha256() {
        let token = ScanTokens::new("secret", 30).issue("12345", 7, at(100));
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn token_verifies_for_current_and_previous_window() {
        let tokens = ScanTokens::new("secret", 30);
        // Window 3 covers days 90..120.
        let token = tokens.issue("12345", 7, at(95));
        assert!(tokens.verify("12345", 7, &token, at(119)));
        assert!(tokens.verify("12345", 7, &token, at(149)));
        assert!(!tokens.verify("12345", 7, &token, at(150)));
    }

    #[test]
    fn token_is_bound_to_chat_business_and_secret() {
        let tokens = ScanTokens::new("secret", 30);
        let token = tokens.issue("12345", 7, at(95));
        assert!(!tokens.verify("12345", 8, &token, at(95)));
        assert!(!tokens.verify("99999", 7, &token, at(95)));
        assert!(!ScanTokens::new("other", 30).verify("12345", 7, &token, at(95)));
        assert!(!tokens.verify("12345", 7, "", at(95)));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let tokens = ScanTokens::new("secret", 30);
        let token = tokens.issue("12345", 7, at(95)).to_ascii_uppercase();
        assert!(tokens.verify("12345", 7, &token, at(95)));
    }
}
