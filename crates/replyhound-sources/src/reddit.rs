//! Subreddit `/new` listing client.
//!
//! With app credentials it exchanges them for a client-credentials token and
//! reads from `oauth.reddit.com`; without them it falls back to the public
//! `www.reddit.com` JSON listing.

use std::time::Duration;

use chrono::Utc;
use replyhound_core::PostCandidate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::SourceError;
use crate::reddit_helpers::to_candidate;

const WWW_BASE_URL: &str = "https://www.reddit.com";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
const DEFAULT_LIMIT: u32 = 25;

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Reddit OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Subreddit listing wrapper.
#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Post>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Post {
    pub(crate) data: PostData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostData {
    pub(crate) name: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) selftext: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) subreddit: Option<String>,
    pub(crate) permalink: Option<String>,
    pub(crate) created_utc: Option<f64>,
    #[serde(default)]
    pub(crate) stickied: bool,
}

pub struct RedditClient {
    client: Client,
    user_agent: String,
    credentials: Option<RedditCredentials>,
    token: Mutex<Option<String>>,
    www_base: String,
    oauth_base: String,
}

impl RedditClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(
        user_agent: &str,
        credentials: Option<RedditCredentials>,
        timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        Self::with_base_urls(
            user_agent,
            credentials,
            timeout_secs,
            WWW_BASE_URL,
            OAUTH_BASE_URL,
        )
    }

    /// Point both hosts at custom URLs (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn with_base_urls(
        user_agent: &str,
        credentials: Option<RedditCredentials>,
        timeout_secs: u64,
        www_base: &str,
        oauth_base: &str,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            credentials,
            token: Mutex::new(None),
            www_base: www_base.trim_end_matches('/').to_string(),
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
        })
    }

    async fn access_token(&self, creds: &RedditCredentials) -> Result<String, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .client
            .post(format!("{}/api/v1/access_token", self.www_base))
            .header("User-Agent", &self.user_agent)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Reddit(format!(
                "token exchange failed with status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Reddit(format!("token parse error: {e}")))?;

        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    /// Fetch the newest posts of `subreddit` as candidates.
    ///
    /// Stickied, deleted and removed posts are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Reddit`] on a non-success status or unparseable
    /// listing, [`SourceError::Http`] on network failure.
    pub async fn fetch_new(
        &self,
        subreddit: &str,
        limit: Option<u32>,
    ) -> Result<Vec<PostCandidate>, SourceError> {
        let subreddit = subreddit.trim().trim_start_matches("r/");
        let limit = limit.unwrap_or(DEFAULT_LIMIT).to_string();

        let request = match &self.credentials {
            Some(creds) => {
                let token = self.access_token(creds).await?;
                self.client
                    .get(format!("{}/r/{subreddit}/new", self.oauth_base))
                    .bearer_auth(token)
            }
            None => self
                .client
                .get(format!("{}/r/{subreddit}/new.json", self.www_base)),
        };

        let response = request
            .header("User-Agent", &self.user_agent)
            .query(&[("limit", limit.as_str()), ("raw_json", "1")])
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Token expired; the next call re-authenticates.
            *self.token.lock().await = None;
        }
        if !response.status().is_success() {
            return Err(SourceError::Reddit(format!(
                "listing r/{subreddit} failed with status {}",
                response.status()
            )));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| SourceError::Reddit(format!("listing parse error: {e}")))?;

        let now = Utc::now();
        let candidates: Vec<PostCandidate> = listing
            .data
            .children
            .iter()
            .filter_map(|post| to_candidate(&post.data, now))
            .collect();

        tracing::debug!(
            subreddit,
            fetched = listing.data.children.len(),
            candidates = candidates.len(),
            "fetched subreddit listing"
        );

        Ok(candidates)
    }
}
