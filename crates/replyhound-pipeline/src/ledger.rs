//! Dedup ledger and self-response fingerprinting.
//!
//! Both live in one [`SeenStore`]: `"{source}::{identity}::{business_id}"`
//! keys for per-business content claims, `"resp:{chunk}"` keys for fingerprint
//! chunks of replies we published, and `"post:{response_id}"` claims for
//! direct posts.

use std::sync::Arc;

use replyhound_core::{PostCandidate, SeenStore, SourceKind, StoreError};

const TRACKING_PARAMS: [&str; 9] = [
    "fbclid", "gclid", "ref", "ref_src", "si", "share_id", "igshid", "mc_cid", "mc_eid",
];
const BODY_PREFIX_CHARS: usize = 200;
const WINDOW_WORDS: usize = 5;
const WINDOW_STRIDE: usize = 3;
const EDGE_CHARS: usize = 40;
const FINGERPRINT_PREFIX: &str = "resp:";
const FINGERPRINT_SOURCE: &str = "self_response";
const POST_CLAIM_SOURCE: &str = "direct_post";

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Strip the fragment and tracking query parameters, lowercase scheme and
/// host, and drop a trailing slash.
#[must_use]
pub fn canonicalize_link(link: &str) -> String {
    let link = link.trim();
    let without_fragment = link.split('#').next().unwrap_or(link);
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };

    let base = match base.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
            let path = path.trim_end_matches('/');
            format!(
                "{}://{}{}",
                scheme.to_ascii_lowercase(),
                host.to_ascii_lowercase(),
                path
            )
        }
        None => base.trim_end_matches('/').to_string(),
    };

    let kept: Vec<&str> = query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| !is_tracking_param(pair.split('=').next().unwrap_or(pair)))
        .collect();

    if kept.is_empty() {
        base
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

fn text_identity(candidate: &PostCandidate) -> String {
    let title = candidate.title.trim().to_lowercase();
    if !title.is_empty() {
        return title;
    }
    let body: String = candidate.body.chars().take(BODY_PREFIX_CHARS).collect();
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The part of a dedup key that identifies the content item.
///
/// Feed sources use the canonical permalink. Manual scans carry the page URL,
/// which identifies the page rather than the post, so they use the text.
#[must_use]
pub fn content_identity(candidate: &PostCandidate) -> String {
    match candidate.source {
        SourceKind::Reddit | SourceKind::GoogleAlerts => candidate
            .link
            .as_deref()
            .map(canonicalize_link)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| text_identity(candidate)),
        SourceKind::Bookmarklet | SourceKind::Screenshot => text_identity(candidate),
    }
}

#[must_use]
pub fn dedup_key(source: SourceKind, identity: &str, business_id: i64) -> String {
    format!("{source}::{identity}::{business_id}")
}

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// Lowercase, non-alphanumerics to spaces, whitespace collapsed.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every 5-word window at stride 3, plus the first and last 40 normalized
/// characters. Duplicates are removed, order is kept.
#[must_use]
pub fn fingerprint_chunks(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut push = |chunk: String| {
        if !chunks.contains(&chunk) {
            chunks.push(chunk);
        }
    };

    let words: Vec<&str> = normalized.split(' ').collect();
    if words.len() >= WINDOW_WORDS {
        for start in (0..=words.len() - WINDOW_WORDS).step_by(WINDOW_STRIDE) {
            push(words[start..start + WINDOW_WORDS].join(" "));
        }
    }

    let chars: Vec<char> = normalized.chars().collect();
    push(chars.iter().take(EDGE_CHARS).collect());
    push(chars[chars.len().saturating_sub(EDGE_CHARS)..].iter().collect());

    chunks
}

fn post_claim_key(response_id: i64) -> String {
    format!("post:{response_id}")
}

fn fingerprint_keys(text: &str) -> Vec<String> {
    fingerprint_chunks(text)
        .into_iter()
        .map(|c| format!("{FINGERPRINT_PREFIX}{c}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Ledger {
    seen: Arc<dyn SeenStore>,
    self_echo_min_matches: usize,
}

impl Ledger {
    #[must_use]
    pub fn new(seen: Arc<dyn SeenStore>, self_echo_min_matches: usize) -> Self {
        Self {
            seen,
            self_echo_min_matches: self_echo_min_matches.max(1),
        }
    }

    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backing store.
    pub async fn has_been_seen(&self, key: &str) -> Result<bool, StoreError> {
        self.seen.exists(key).await
    }

    /// Record `key`. Returns `true` only for the caller that inserted it, so
    /// concurrent evaluators of one item cannot both proceed.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backing store.
    pub async fn mark_seen(&self, key: &str, source: &str) -> Result<bool, StoreError> {
        self.seen.insert_if_absent(key, source).await
    }

    /// `true` when enough of the text's fingerprint chunks were published by us.
    /// A text with fewer chunks than the threshold must match all of them.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backing store.
    pub async fn is_self_echo(&self, text: &str) -> Result<bool, StoreError> {
        let keys = fingerprint_keys(text);
        if keys.is_empty() {
            return Ok(false);
        }
        let required = self.self_echo_min_matches.min(keys.len());
        let matched = self.seen.count_existing(&keys).await?;
        Ok(matched >= required)
    }

    /// Claim the single direct post of a response. Only one caller wins.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backing store.
    pub async fn claim_post(&self, response_id: i64) -> Result<bool, StoreError> {
        self.seen
            .insert_if_absent(&post_claim_key(response_id), POST_CLAIM_SOURCE)
            .await
    }

    /// Give back a claim after the post itself failed.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backing store.
    pub async fn release_post(&self, response_id: i64) -> Result<(), StoreError> {
        self.seen.release(&post_claim_key(response_id)).await
    }

    /// Store the fingerprint of a reply we published.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backing store.
    pub async fn record_published(&self, text: &str) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for key in fingerprint_keys(text) {
            if self.seen.insert_if_absent(&key, FINGERPRINT_SOURCE).await? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
