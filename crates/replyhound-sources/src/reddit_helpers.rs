//! Reddit post conversion helpers.

use chrono::{DateTime, TimeZone, Utc};
use replyhound_core::{types::truncate_chars, PostCandidate, SourceKind, ORIGINAL_POST_MAX_CHARS};

use crate::reddit::PostData;

const REDDIT_ORIGIN: &str = "https://www.reddit.com";

fn is_gone(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("[deleted]" | "[removed]"))
}

pub(crate) fn to_candidate(post: &PostData, now: DateTime<Utc>) -> Option<PostCandidate> {
    if post.stickied || is_gone(post.author.as_deref()) || is_gone(post.selftext.as_deref()) {
        return None;
    }

    let title = post.title.as_deref().unwrap_or("").trim().to_string();
    let body = truncate_chars(
        post.selftext.as_deref().unwrap_or("").trim(),
        ORIGINAL_POST_MAX_CHARS,
    );
    if title.is_empty() && body.is_empty() {
        return None;
    }

    let link = post.permalink.as_deref().map(|p| {
        if p.starts_with("http") {
            p.to_string()
        } else {
            format!("{REDDIT_ORIGIN}{p}")
        }
    });

    #[allow(clippy::cast_possible_truncation)]
    let age_hint = post
        .created_utc
        .and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single())
        .map(|created| format_age(created, now));

    Some(PostCandidate {
        source: SourceKind::Reddit,
        source_id: post.name.clone(),
        title,
        body,
        link,
        group_name: post.subreddit.as_ref().map(|s| format!("r/{s}")),
        author_name: post.author.as_ref().map(|a| format!("u/{a}")),
        age_hint,
    })
}

/// Human "how long ago" string: `just now`, `12m ago`, `3h ago`, `2d ago`.
#[must_use]
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
