//! Bookmarklet and screenshot payload normalization.

use replyhound_core::{types::truncate_chars, PostCandidate, SourceKind, ORIGINAL_POST_MAX_CHARS};
use serde::Deserialize;

use crate::error::SourceError;

/// A post the operator scanned from a social feed page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualPost {
    pub text: String,
    pub group_name: Option<String>,
    pub author_name: Option<String>,
    pub page_url: Option<String>,
    pub post_age: Option<String>,
}

/// Output of screenshot text extraction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrExtraction {
    pub text: String,
    pub group_name: Option<String>,
    pub author_name: Option<String>,
    pub page_url: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize(
    source: SourceKind,
    text: &str,
    group_name: Option<String>,
    author_name: Option<String>,
    page_url: Option<String>,
    age_hint: Option<String>,
) -> Result<PostCandidate, SourceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SourceError::EmptyText);
    }

    Ok(PostCandidate {
        source,
        source_id: None,
        title: String::new(),
        body: truncate_chars(text, ORIGINAL_POST_MAX_CHARS),
        link: clean(page_url),
        group_name: clean(group_name),
        author_name: clean(author_name),
        age_hint: clean(age_hint),
    })
}

/// # Errors
///
/// Returns [`SourceError::EmptyText`] when the text is blank.
pub fn from_bookmarklet(post: ManualPost) -> Result<PostCandidate, SourceError> {
    normalize(
        SourceKind::Bookmarklet,
        &post.text,
        post.group_name,
        post.author_name,
        post.page_url,
        post.post_age,
    )
}

/// # Errors
///
/// Returns [`SourceError::EmptyText`] when extraction produced no text.
pub fn from_screenshot(extraction: OcrExtraction) -> Result<PostCandidate, SourceError> {
    normalize(
        SourceKind::Screenshot,
        &extraction.text,
        extraction.group_name,
        extraction.author_name,
        extraction.page_url,
        None,
    )
}
