//! Posts approved replies as Reddit comments using a script-app account.

use std::time::Duration;

use async_trait::async_trait;
use replyhound_core::{DeliveryError, ReplyPoster};
use reqwest::Client;
use serde::Deserialize;

use crate::error::SourceError;

const WWW_BASE_URL: &str = "https://www.reddit.com";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
const REDDIT_ORIGIN: &str = "https://www.reddit.com";

#[derive(Clone)]
pub struct RedditPosterCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RedditPosterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditPosterCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    json: CommentJson,
}

#[derive(Debug, Deserialize)]
struct CommentJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    data: Option<CommentData>,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    things: Vec<CommentThing>,
}

#[derive(Debug, Deserialize)]
struct CommentThing {
    data: CommentThingData,
}

#[derive(Debug, Deserialize)]
struct CommentThingData {
    permalink: Option<String>,
}

pub struct RedditPoster {
    client: Client,
    user_agent: String,
    credentials: RedditPosterCredentials,
    www_base: String,
    oauth_base: String,
}

impl RedditPoster {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(
        user_agent: &str,
        credentials: RedditPosterCredentials,
    ) -> Result<Self, SourceError> {
        Self::with_base_urls(user_agent, credentials, WWW_BASE_URL, OAUTH_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn with_base_urls(
        user_agent: &str,
        credentials: RedditPosterCredentials,
        www_base: &str,
        oauth_base: &str,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            credentials,
            www_base: www_base.trim_end_matches('/').to_string(),
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
        })
    }

    async fn password_token(&self) -> Result<String, SourceError> {
        let creds = &self.credentials;
        let response = self
            .client
            .post(format!("{}/api/v1/access_token", self.www_base))
            .header("User-Agent", &self.user_agent)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
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
        Ok(token.access_token)
    }

    async fn comment(&self, post_url: &str, text: &str) -> Result<String, SourceError> {
        let post_id = post_id_from_url(post_url)
            .ok_or_else(|| SourceError::Reddit(format!("not a Reddit post URL: {post_url}")))?;
        let thing_id = format!("t3_{post_id}");
        let token = self.password_token().await?;

        let response = self
            .client
            .post(format!("{}/api/comment", self.oauth_base))
            .header("User-Agent", &self.user_agent)
            .bearer_auth(token)
            .form(&[
                ("api_type", "json"),
                ("thing_id", thing_id.as_str()),
                ("text", text),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Reddit(format!(
                "comment failed with status {}",
                response.status()
            )));
        }

        let body: CommentResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Reddit(format!("comment response parse error: {e}")))?;
        if !body.json.errors.is_empty() {
            return Err(SourceError::Reddit(format!(
                "comment rejected: {}",
                serde_json::Value::Array(body.json.errors)
            )));
        }

        let permalink = body
            .json
            .data
            .and_then(|d| d.things.into_iter().next())
            .and_then(|t| t.data.permalink)
            .map_or_else(|| post_url.to_string(), |p| format!("{REDDIT_ORIGIN}{p}"));
        Ok(permalink)
    }
}

#[async_trait]
impl ReplyPoster for RedditPoster {
    async fn post_reply(&self, post_url: &str, text: &str) -> Result<String, DeliveryError> {
        self.comment(post_url, text)
            .await
            .map_err(|e| DeliveryError(e.to_string()))
    }
}

/// The base-36 post id from a `/comments/<id>/` permalink.
fn post_id_from_url(url: &str) -> Option<&str> {
    let mut segments = url.split('/');
    segments.find(|s| *s == "comments")?;
    segments.next().filter(|id| {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
    })
}
