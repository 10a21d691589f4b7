//! Source normalizer: turns Reddit listings, Google Alerts feeds, bookmarklet
//! payloads and OCR extractions into [`PostCandidate`]s, plus the Reddit
//! client used to post approved replies.
//!
//! [`PostCandidate`]: replyhound_core::PostCandidate

pub mod alerts;
pub mod error;
pub mod feed;
pub mod manual;
pub mod poster;
pub mod reddit;
mod reddit_helpers;

pub use alerts::AlertsClient;
pub use error::SourceError;
pub use feed::{parse_feed, strip_html, unwrap_google_redirect};
pub use manual::{from_bookmarklet, from_screenshot, ManualPost, OcrExtraction};
pub use poster::{RedditPoster, RedditPosterCredentials};
pub use reddit::{RedditClient, RedditCredentials};
pub use reddit_helpers::format_age;
