/// A supported music content source with its own URL shape and title lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Spotify,
    YouTube,
    YouTubeMusic,
}

impl Provider {
    /// Extraction precedence and artifact column order. The URL patterns are
    /// mutually exclusive, so precedence only matters for determinism.
    pub const ALL: [Provider; 3] = [Provider::Spotify, Provider::YouTube, Provider::YouTubeMusic];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spotify" => Some(Self::Spotify),
            "youtube" => Some(Self::YouTube),
            "youtube-music" | "youtube_music" => Some(Self::YouTubeMusic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::YouTube => "youtube",
            Self::YouTubeMusic => "youtube-music",
        }
    }

    /// Header label for this provider's column in the summary artifact.
    /// Stable across calls within one deployment.
    pub fn column_label(&self) -> &'static str {
        match self {
            Self::Spotify => "Spotify URL",
            Self::YouTube => "YouTube URL",
            Self::YouTubeMusic => "YouTube Music URL",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
