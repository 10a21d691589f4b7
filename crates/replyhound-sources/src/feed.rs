//! Atom/RSS feed parsing for Google Alerts, plus HTML stripping and
//! redirect unwrapping.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use replyhound_core::{types::truncate_chars, PostCandidate, SourceKind, ORIGINAL_POST_MAX_CHARS};

use crate::error::SourceError;
use crate::reddit_helpers::format_age;

const ALERT_TITLE_PREFIX: &str = "Google Alert - ";

#[derive(Default)]
struct Entry {
    id: String,
    title: String,
    link: String,
    content: String,
    published: String,
}

impl Entry {
    fn into_candidate(self, feed_title: &str, now: DateTime<Utc>) -> Option<PostCandidate> {
        let title = strip_html(&self.title);
        let body = truncate_chars(&strip_html(&self.content), ORIGINAL_POST_MAX_CHARS);
        if title.is_empty() && body.is_empty() {
            return None;
        }

        let link = Some(self.link.trim())
            .filter(|l| !l.is_empty())
            .map(unwrap_google_redirect);
        let age_hint = parse_date(self.published.trim()).map(|d| format_age(d, now));
        let group = feed_title
            .trim()
            .trim_start_matches(ALERT_TITLE_PREFIX)
            .trim();

        Some(PostCandidate {
            source: SourceKind::GoogleAlerts,
            source_id: Some(self.id.trim().to_string()).filter(|id| !id.is_empty()),
            title,
            body,
            link,
            group_name: Some(group.to_string()).filter(|g| !g.is_empty()),
            author_name: None,
            age_hint,
        })
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Atom `<link href=..>`; only `rel="alternate"` (or no rel) counts.
fn atom_href(e: &BytesStart<'_>) -> Option<String> {
    let rel = e
        .try_get_attribute("rel")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
    if rel.as_deref().is_some_and(|r| r != "alternate") {
        return None;
    }
    e.try_get_attribute("href")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse an Atom or RSS 2.0 document into candidates.
///
/// Handles `<entry>` (Atom) and `<item>` (RSS) alike. Titles and content are
/// HTML-stripped; links are unwrapped from Google redirect URLs.
///
/// # Errors
///
/// Returns [`SourceError::Xml`] if the XML is malformed.
pub fn parse_feed(xml: &str, now: DateTime<Utc>) -> Result<Vec<PostCandidate>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut candidates = Vec::new();
    let mut feed_title = String::new();
    let mut entry: Option<Entry> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                match name.as_str() {
                    "entry" | "item" => entry = Some(Entry::default()),
                    "link" => {
                        if let (Some(entry), Some(href)) = (entry.as_mut(), atom_href(&e)) {
                            entry.link = href;
                        }
                    }
                    _ => {}
                }
                current_tag = name;
            }
            Ok(Event::Empty(e)) => {
                if local_name(&e) == "link" {
                    if let (Some(entry), Some(href)) = (entry.as_mut(), atom_href(&e)) {
                        entry.link = href;
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "entry" || name == "item" {
                    if let Some(done) = entry.take() {
                        candidates.extend(done.into_candidate(&feed_title, now));
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().into_owned();
                push_text(&mut entry, &mut feed_title, &current_tag, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                push_text(&mut entry, &mut feed_title, &current_tag, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Xml(e)),
            _ => {}
        }
    }

    Ok(candidates)
}

fn push_text(entry: &mut Option<Entry>, feed_title: &mut String, tag: &str, text: &str) {
    let Some(entry) = entry.as_mut() else {
        if tag == "title" && feed_title.is_empty() {
            feed_title.push_str(text);
        }
        return;
    };

    let field = match tag {
        "title" => &mut entry.title,
        "link" => &mut entry.link,
        "content" | "description" | "summary" => &mut entry.content,
        "id" | "guid" => &mut entry.id,
        "published" | "updated" | "pubDate" => {
            if !entry.published.is_empty() {
                return;
            }
            &mut entry.published
        }
        _ => return,
    };
    if !field.is_empty() {
        field.push(' ');
    }
    field.push_str(text);
}

/// Strip HTML tags, decode the common entities, and collapse whitespace.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve `https://www.google.com/url?...&url=<target>` to `<target>`.
/// Any other link is returned unchanged.
#[must_use]
pub fn unwrap_google_redirect(link: &str) -> String {
    let Some((base, query)) = link.split_once('?') else {
        return link.to_string();
    };
    if !(base.contains("google.") && base.ends_with("/url")) {
        return link.to_string();
    }

    let query = query.split('#').next().unwrap_or("");
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| *key == "url" || *key == "q")
        .map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
        .find(|target| target.starts_with("http://") || target.starts_with("https://"))
        .unwrap_or_else(|| link.to_string())
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
