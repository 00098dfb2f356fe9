use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;

use crate::provider::Provider;
use crate::title::{OEmbedTitleResolver, ResolveError, SpotifyTitleResolver, TitleResolver};
use crate::url::{
    spotify_matcher, youtube_matcher, youtube_music_matcher, ExtractError, LinkMatcher,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid URL pattern for provider {provider}: {source}")]
    InvalidPattern { provider: Provider, source: regex::Error },
    #[error("duplicate URL matcher registered for provider {0}")]
    DuplicateMatcher(Provider),
    #[error("no title resolver registered for provider {0}")]
    MissingResolver(Provider),
    #[error("no URL matcher registered for provider {0}")]
    MissingMatcher(Provider),
}

/// The provider strategy registry: URL matchers paired with title
/// resolvers, constructed once at startup.
///
/// The matcher and resolver key sets must be in bijection; `new` validates
/// that up front so resolution can never hit a missing provider at call
/// time. Extraction walks matchers in their registration order, which is
/// the fixed precedence documented on [`Provider::ALL`].
pub struct ProviderRegistry {
    matchers: Vec<Box<dyn LinkMatcher>>,
    resolvers: HashMap<Provider, Arc<dyn TitleResolver>>,
}

impl ProviderRegistry {
    pub fn new(
        matchers: Vec<Box<dyn LinkMatcher>>,
        resolvers: HashMap<Provider, Arc<dyn TitleResolver>>,
    ) -> Result<Self, RegistryError> {
        let mut matched = Vec::with_capacity(matchers.len());
        for matcher in &matchers {
            let provider = matcher.provider();
            if matched.contains(&provider) {
                return Err(RegistryError::DuplicateMatcher(provider));
            }
            if !resolvers.contains_key(&provider) {
                return Err(RegistryError::MissingResolver(provider));
            }
            matched.push(provider);
        }

        for provider in resolvers.keys() {
            if !matched.contains(provider) {
                return Err(RegistryError::MissingMatcher(*provider));
            }
        }

        Ok(Self { matchers, resolvers })
    }

    /// First matching provider wins; a matcher reporting `Ambiguous` is
    /// terminal for the whole message rather than skipped.
    pub fn extract(&self, text: &str) -> Result<(String, Provider), ExtractError> {
        for matcher in &self.matchers {
            match matcher.extract(text) {
                Ok(url) => return Ok((url, matcher.provider())),
                Err(ExtractError::NotFound) => continue,
                Err(ambiguous @ ExtractError::Ambiguous { .. }) => return Err(ambiguous),
            }
        }
        Err(ExtractError::NotFound)
    }

    pub async fn resolve(&self, provider: Provider, url: &str) -> Result<String, ResolveError> {
        let Some(resolver) = self.resolvers.get(&provider) else {
            // new() enforces the matcher/resolver bijection, so a miss here
            // means the registry was built outside that constructor.
            return Err(ResolveError::RequestFailed {
                operation: "resolver lookup",
                reason: format!("no resolver registered for provider {provider}"),
            });
        };
        resolver.resolve(url).await
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.matchers.iter().map(|matcher| matcher.provider())
    }
}

/// Builds the production registry: Spotify page scraping plus the shared
/// oEmbed resolver for both YouTube hosts.
pub fn default_registry(client: Client) -> Result<ProviderRegistry, RegistryError> {
    let matchers: Vec<Box<dyn LinkMatcher>> = vec![
        Box::new(spotify_matcher().map_err(|source| RegistryError::InvalidPattern {
            provider: Provider::Spotify,
            source,
        })?),
        Box::new(youtube_matcher().map_err(|source| RegistryError::InvalidPattern {
            provider: Provider::YouTube,
            source,
        })?),
        Box::new(youtube_music_matcher().map_err(|source| RegistryError::InvalidPattern {
            provider: Provider::YouTubeMusic,
            source,
        })?),
    ];

    let spotify = Arc::new(SpotifyTitleResolver::new(client.clone()).map_err(|source| {
        RegistryError::InvalidPattern { provider: Provider::Spotify, source }
    })?);
    let oembed = Arc::new(OEmbedTitleResolver::new(client));

    let mut resolvers: HashMap<Provider, Arc<dyn TitleResolver>> = HashMap::new();
    resolvers.insert(Provider::Spotify, spotify);
    resolvers.insert(Provider::YouTube, oembed.clone());
    resolvers.insert(Provider::YouTubeMusic, oembed);

    ProviderRegistry::new(matchers, resolvers)
}
