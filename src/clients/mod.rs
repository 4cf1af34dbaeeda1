use std::future::Future;

use crate::clients::entities::{AccessToken, TokenGrant, TopRange, Track};
use crate::clients::errors::Result;

/// Data entities for tracks and tokens
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// Spotify Web API clients
pub mod spotify;

pub use spotify::{SpotifyAuth, SpotifyClient};

/// Something that can issue Spotify access tokens.
pub trait TokenSource: Send + Sync + 'static {
    /// Requests a new access token.
    fn fetch_token(&self) -> impl Future<Output = Result<TokenGrant>> + Send;
}

/// Something that can answer the three listening-history queries.
pub trait TrackSource: Send + Sync + 'static {
    /// The track playing right now, `None` when nothing (or a non-track item) is playing.
    fn currently_playing(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Option<Track>>> + Send;

    /// The most recently played tracks, newest first.
    fn recently_played(
        &self,
        token: &AccessToken,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Track>>> + Send;

    /// The user's top tracks over `range`, highest ranked first.
    fn top_tracks(
        &self,
        token: &AccessToken,
        limit: u32,
        range: TopRange,
    ) -> impl Future<Output = Result<Vec<Track>>> + Send;
}
