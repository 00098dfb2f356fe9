use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{operation}: request failed: {reason}")]
    RequestFailed { operation: &'static str, reason: String },
    #[error("{operation}: no title found in response")]
    NoTitleFound { operation: &'static str },
}

/// Maps a canonical music URL to a human-readable title via one bounded
/// network lookup. Non-success responses are `RequestFailed`; a fetched
/// body without the expected fields is `NoTitleFound`.
#[async_trait]
pub trait TitleResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<String, ResolveError>;
}

/// Resolves Spotify track titles by scraping Open Graph meta tags from the
/// track page. The og:description leads with the artist list, separated
/// from the rest by " · ".
pub struct SpotifyTitleResolver {
    client: Client,
    og_title: Regex,
    og_description: Regex,
}

const SPOTIFY_FETCH_OPERATION: &str = "spotify page fetch";

impl SpotifyTitleResolver {
    pub fn new(client: Client) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            og_title: Regex::new(r#"<meta\s+property="og:title"\s+content="([^"]+)""#)?,
            og_description: Regex::new(r#"<meta\s+property="og:description"\s+content="([^"]+)""#)?,
        })
    }

    fn title_from_page(&self, html: &str) -> Result<String, ResolveError> {
        let title = self
            .og_title
            .captures(html)
            .and_then(|captures| captures.get(1))
            .map(|capture| capture.as_str().trim().to_owned())
            .ok_or(ResolveError::NoTitleFound { operation: SPOTIFY_FETCH_OPERATION })?;

        let Some(description) = self
            .og_description
            .captures(html)
            .and_then(|captures| captures.get(1))
            .map(|capture| capture.as_str().trim())
        else {
            return Ok(title);
        };

        // Description format: "Artist(s) · Album/Song · Type · Year". Only
        // the leading artist segment is wanted; if the page schema changed
        // and the separator is gone, keep the raw description as prefix.
        match description.split_once(" · ") {
            Some((artists, _)) => Ok(format!("{artists} - {title}")),
            None => Ok(format!("{description} - {title}")),
        }
    }
}

#[async_trait]
impl TitleResolver for SpotifyTitleResolver {
    async fn resolve(&self, url: &str) -> Result<String, ResolveError> {
        let response = self.client.get(url).send().await.map_err(|error| {
            ResolveError::RequestFailed {
                operation: SPOTIFY_FETCH_OPERATION,
                reason: error.to_string(),
            }
        })?;

        if !response.status().is_success() {
            return Err(ResolveError::RequestFailed {
                operation: SPOTIFY_FETCH_OPERATION,
                reason: format!("unexpected status {}", response.status()),
            });
        }

        let html = response.text().await.map_err(|error| ResolveError::RequestFailed {
            operation: SPOTIFY_FETCH_OPERATION,
            reason: error.to_string(),
        })?;

        self.title_from_page(&html)
    }
}

/// Resolves video titles through the YouTube oEmbed endpoint; shared by the
/// YouTube and YouTube Music providers since both hosts serve the same
/// metadata API.
pub struct OEmbedTitleResolver {
    client: Client,
    endpoint: String,
}

const OEMBED_ENDPOINT: &str = "https://youtube.com/oembed";
const OEMBED_OPERATION: &str = "youtube oembed lookup";

#[derive(Debug, Deserialize)]
struct OEmbedBody {
    #[serde(default)]
    title: String,
}

impl OEmbedTitleResolver {
    pub fn new(client: Client) -> Self {
        Self { client, endpoint: OEMBED_ENDPOINT.to_owned() }
    }

    #[cfg(test)]
    fn with_endpoint(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    fn title_from_body(body: OEmbedBody) -> Result<String, ResolveError> {
        if body.title.is_empty() {
            return Err(ResolveError::NoTitleFound { operation: OEMBED_OPERATION });
        }
        Ok(body.title)
    }
}

#[async_trait]
impl TitleResolver for OEmbedTitleResolver {
    async fn resolve(&self, url: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("url", url)])
            .send()
            .await
            .map_err(|error| ResolveError::RequestFailed {
                operation: OEMBED_OPERATION,
                reason: error.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ResolveError::RequestFailed {
                operation: OEMBED_OPERATION,
                reason: format!("unexpected status {}", response.status()),
            });
        }

        let body = response
            .json::<OEmbedBody>()
            .await
            .map_err(|_| ResolveError::NoTitleFound { operation: OEMBED_OPERATION })?;

        Self::title_from_body(body)
    }
}
