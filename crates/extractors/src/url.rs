use regex::Regex;
use thiserror::Error;

use crate::provider::Provider;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no known music URL found in text")]
    NotFound,
    #[error("multiple {provider} URLs found in one message")]
    Ambiguous { provider: Provider },
}

/// Scans free-form text for one provider's URL shape.
///
/// Exactly one occurrence yields the URL; zero yields `NotFound`; two or
/// more yield `Ambiguous` — the matcher never guesses which of several
/// links is "the" link.
pub trait LinkMatcher: Send + Sync {
    fn provider(&self) -> Provider;
    fn extract(&self, text: &str) -> Result<String, ExtractError>;
}

pub struct RegexLinkMatcher {
    provider: Provider,
    pattern: Regex,
}

impl RegexLinkMatcher {
    pub fn new(provider: Provider, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { provider, pattern: Regex::new(pattern)? })
    }
}

impl LinkMatcher for RegexLinkMatcher {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn extract(&self, text: &str) -> Result<String, ExtractError> {
        let mut matches = self.pattern.find_iter(text);
        let Some(first) = matches.next() else {
            return Err(ExtractError::NotFound);
        };
        if matches.next().is_some() {
            return Err(ExtractError::Ambiguous { provider: self.provider });
        }
        Ok(first.as_str().to_owned())
    }
}

// Track pages only; playlist/album/artist paths on the same host must not
// match and fall through to NotFound for this provider.
const SPOTIFY_TRACK_PATTERN: &str = r"https?://(?:open\.)?spotify\.com/track/[\w\-?=&]+";
const YOUTUBE_VIDEO_PATTERN: &str = r"https?://(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/)[\w\-]+";
const YOUTUBE_MUSIC_PATTERN: &str = r"https?://music\.youtube\.com/watch\?v=[\w\-]+(?:&[\w=&\-]+)?";

pub fn spotify_matcher() -> Result<RegexLinkMatcher, regex::Error> {
    RegexLinkMatcher::new(Provider::Spotify, SPOTIFY_TRACK_PATTERN)
}

pub fn youtube_matcher() -> Result<RegexLinkMatcher, regex::Error> {
    RegexLinkMatcher::new(Provider::YouTube, YOUTUBE_VIDEO_PATTERN)
}

pub fn youtube_music_matcher() -> Result<RegexLinkMatcher, regex::Error> {
    RegexLinkMatcher::new(Provider::YouTubeMusic, YOUTUBE_MUSIC_PATTERN)
}
