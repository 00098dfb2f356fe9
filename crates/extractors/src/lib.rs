//! Music link extraction and title resolution.
//!
//! This crate holds the pluggable provider pipeline:
//! - **URL matchers** (`url`) - scan free-form message text for one
//!   provider's link shape (exactly-one semantics, ambiguity is an error)
//! - **Title resolvers** (`title`) - map a canonical URL to an
//!   "artist - title" string via a bounded network lookup
//! - **Registry** (`registry`) - matcher/resolver pairs keyed by
//!   [`Provider`], with the key-set bijection validated at construction
//!
//! Supported providers: Spotify tracks, YouTube videos, YouTube Music
//! tracks. Adding a provider means one matcher, one resolver, and one
//! `Provider` variant; the registry refuses to build until all three line
//! up.

pub mod provider;
pub mod registry;
pub mod title;
pub mod url;

pub use provider::Provider;
pub use registry::{default_registry, ProviderRegistry, RegistryError};
pub use title::{OEmbedTitleResolver, ResolveError, SpotifyTitleResolver, TitleResolver};
pub use url::{ExtractError, LinkMatcher, RegexLinkMatcher};
