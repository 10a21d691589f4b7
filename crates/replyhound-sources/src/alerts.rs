//! Google Alerts feed client.

use std::time::Duration;

use chrono::Utc;
use replyhound_core::PostCandidate;
use reqwest::Client;

use crate::error::SourceError;
use crate::feed::parse_feed;

pub struct AlertsClient {
    client: Client,
}

impl AlertsClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch one alert feed (Atom or RSS) and normalize its entries.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::FeedStatus`] on a non-success status,
    /// [`SourceError::Http`] on network failure or [`SourceError::Xml`] on a
    /// malformed document.
    pub async fn fetch(&self, feed_url: &str) -> Result<Vec<PostCandidate>, SourceError> {
        let response = self.client.get(feed_url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::FeedStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        let candidates = parse_feed(&body, Utc::now())?;
        tracing::debug!(feed_url, candidates = candidates.len(), "fetched alert feed");
        Ok(candidates)
    }
}
