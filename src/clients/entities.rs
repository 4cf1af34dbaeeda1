use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A track as shown on the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Spotify track id (base62, without the `spotify:track:` prefix).
    pub id: String,
    /// Track title.
    pub name: String,
    /// All artist names, comma separated.
    pub artist: String,
    /// Album title.
    pub album: String,
    /// Largest album cover, when Spotify has one.
    pub album_image_url: Option<String>,
    /// Link to the track on open.spotify.com.
    pub spotify_url: String,
}

/// Joins artist names the way they are displayed: `"A, B, C"`.
pub fn join_artists<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

/// Bearer token for the Spotify Web API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw bearer string.
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    /// The raw bearer string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// A freshly issued token and how long it lives.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The issued token.
    pub access_token: AccessToken,
    /// Lifetime counted from the moment the grant was received.
    pub expires_in: Duration,
}

/// The three Spotify endpoints the panel reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// `/me/player/currently-playing`
    Current,
    /// `/me/player/recently-played`
    Recent,
    /// `/me/top/tracks`
    Top,
}

impl Endpoint {
    /// Message shown when a fetch fails for any reason other than rate limiting.
    pub fn error_message(self) -> &'static str {
        match self {
            Endpoint::Current => "Error fetching current track",
            Endpoint::Recent => "Error fetching recent tracks",
            Endpoint::Top => "Error fetching top tracks",
        }
    }
}

/// The two track lists, one per panel tab.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Recently played tracks.
    #[default]
    Recent,
    /// Top tracks over the configured time range.
    Top,
}

impl ListKind {
    /// Tab label.
    pub fn label(self) -> &'static str {
        match self {
            ListKind::Recent => "Recently Played",
            ListKind::Top => "Top Tracks",
        }
    }
}

impl From<ListKind> for Endpoint {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Recent => Endpoint::Recent,
            ListKind::Top => Endpoint::Top,
        }
    }
}

/// Time window for the top tracks list.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum TopRange {
    /// Roughly the last four weeks.
    #[default]
    ShortTerm,
    /// Roughly the last six months.
    MediumTerm,
    /// Several years of data.
    LongTerm,
}

impl TopRange {
    /// Parses the `snake_case` name used in configuration files.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "short_term" => Some(TopRange::ShortTerm),
            "medium_term" => Some(TopRange::MediumTerm),
            "long_term" => Some(TopRange::LongTerm),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artists_are_comma_joined() {
        assert_eq!(join_artists(["Daft Punk"]), "Daft Punk");
        assert_eq!(
            join_artists(["Simon", "Garfunkel", "Friends"]),
            "Simon, Garfunkel, Friends"
        );
        assert_eq!(join_artists(Vec::<&str>::new()), "");
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("BQD-secret");
        assert!(!format!("{token:?}").contains("secret"));
        assert_eq!(token.as_str(), "BQD-secret");
    }

    #[test]
    fn tabs_map_onto_endpoints() {
        assert_eq!(Endpoint::from(ListKind::Recent), Endpoint::Recent);
        assert_eq!(Endpoint::from(ListKind::Top), Endpoint::Top);
        assert_eq!(
            Endpoint::Top.error_message(),
            "Error fetching top tracks"
        );
    }

    #[test]
    fn top_range_parses_config_names() {
        assert_eq!(TopRange::parse("short_term"), Some(TopRange::ShortTerm));
        assert_eq!(TopRange::parse(" long_term "), Some(TopRange::LongTerm));
        assert_eq!(TopRange::parse("forever"), None);
    }

    #[test]
    fn track_serializes_camel_case() {
        let track = Track {
            id: "4uLU6hMCjMI75M1A2tKUQC".into(),
            name: "Never Gonna Give You Up".into(),
            artist: "Rick Astley".into(),
            album: "Whenever You Need Somebody".into(),
            album_image_url: None,
            spotify_url: "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC".into(),
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["spotifyUrl"], track.spotify_url.as_str());
        assert!(json["albumImageUrl"].is_null());
    }
}
