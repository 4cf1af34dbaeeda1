use log::debug;

use crate::clients::{
    TokenSource, TrackSource,
    entities::{AccessToken, TokenGrant, TopRange, Track, join_artists},
    errors::{Error, Result},
};
use crate::config::Settings;
use rspotify::{
    AuthCodeSpotify, Config, Credentials, OAuth, Token,
    model::{AdditionalType, FullTrack, PlayableItem, TimeRange},
    prelude::*,
};

const OPEN_SPOTIFY_TRACK_URL: &str = "https://open.spotify.com/track/";

impl TryFrom<FullTrack> for Track {
    type Error = Error;

    fn try_from(f: FullTrack) -> Result<Track> {
        // Local files have no Spotify id and cannot be linked to
        let id = f
            .id
            .as_ref()
            .map(|id| id.id().to_owned())
            .ok_or_else(|| Error::UnexpectedResponse(format!("track {:?} has no id", f.name)))?;
        let spotify_url = f
            .external_urls
            .get("spotify")
            .cloned()
            .unwrap_or_else(|| format!("{OPEN_SPOTIFY_TRACK_URL}{id}"));
        Ok(Track {
            artist: join_artists(f.artists.iter().map(|a| a.name.as_str())),
            album_image_url: f.album.images.first().map(|image| image.url.clone()),
            album: f.album.name,
            name: f.name,
            spotify_url,
            id,
        })
    }
}

impl From<TopRange> for TimeRange {
    fn from(range: TopRange) -> TimeRange {
        match range {
            TopRange::ShortTerm => TimeRange::ShortTerm,
            TopRange::MediumTerm => TimeRange::MediumTerm,
            TopRange::LongTerm => TimeRange::LongTerm,
        }
    }
}

fn convert_tracks(tracks: impl IntoIterator<Item = FullTrack>) -> Vec<Track> {
    tracks
        .into_iter()
        .filter_map(|t| match Track::try_from(t) {
            Ok(track) => Some(track),
            Err(e) => {
                debug!("Skipping track: {e}");
                None
            }
        })
        .collect()
}

// rspotify refreshes tokens on its own unless told otherwise; TokenManager owns that job here
fn client_config() -> Config {
    Config {
        token_refreshing: false,
        ..Default::default()
    }
}

async fn replace_token(spotify: &AuthCodeSpotify, token: Token) -> Result<()> {
    let mut guard = spotify
        .token
        .lock()
        .await
        .map_err(|_| Error::TokenError("Spotify token lock is poisoned".into()))?;
    *guard = Some(token);
    Ok(())
}

/// Issues access tokens through the refresh-token grant.
pub struct SpotifyAuth {
    spotify: AuthCodeSpotify,
    refresh_token: String,
}

impl SpotifyAuth {
    /// Wraps an rspotify client that carries the app credentials.
    pub fn new(spotify: AuthCodeSpotify, refresh_token: String) -> Self {
        SpotifyAuth {
            spotify,
            refresh_token,
        }
    }

    /// Create a `SpotifyAuth` from settings or raise a configuration error.
    pub fn try_from_settings(settings: &Settings) -> Result<Self> {
        let credentials = settings.credentials()?;
        let creds = Credentials::new(&credentials.client_id, &credentials.client_secret);
        let spotify = AuthCodeSpotify::with_config(creds, OAuth::default(), client_config());
        Ok(SpotifyAuth::new(spotify, credentials.refresh_token.clone()))
    }
}

impl TokenSource for SpotifyAuth {
    async fn fetch_token(&self) -> Result<TokenGrant> {
        debug!("Requesting a new Spotify access token ...");
        replace_token(
            &self.spotify,
            Token {
                refresh_token: Some(self.refresh_token.clone()),
                ..Default::default()
            },
        )
        .await?;
        self.spotify
            .refresh_token()
            .await
            .map_err(Error::from_client)?;

        let guard = self
            .spotify
            .token
            .lock()
            .await
            .map_err(|_| Error::TokenError("Spotify token lock is poisoned".into()))?;
        let token = guard
            .as_ref()
            .ok_or_else(|| Error::TokenError("Spotify returned no access token".into()))?;
        let expires_in = token
            .expires_in
            .to_std()
            .map_err(|e| Error::TokenError(format!("invalid token lifetime: {e}")))?;
        debug!("Received Spotify access token valid for {expires_in:?}");
        Ok(TokenGrant {
            access_token: AccessToken::new(token.access_token.clone()),
            expires_in,
        })
    }
}

/// Reads listening history from the Spotify Web API.
pub struct SpotifyClient {
    /// Underlying rspotify client; its token is replaced before every call.
    pub spotify: AuthCodeSpotify,
}

impl SpotifyClient {
    /// Wraps an rspotify client.
    pub fn new(spotify: AuthCodeSpotify) -> Self {
        SpotifyClient { spotify }
    }

    /// A client with token refreshing disabled.
    pub fn try_default() -> Result<Self> {
        let spotify = AuthCodeSpotify::with_config(
            Credentials::new("", ""),
            OAuth::default(),
            client_config(),
        );
        Ok(Self { spotify })
    }

    async fn authorize(&self, token: &AccessToken) -> Result<()> {
        replace_token(
            &self.spotify,
            Token {
                access_token: token.as_str().to_owned(),
                ..Default::default()
            },
        )
        .await
    }
}

impl TrackSource for SpotifyClient {
    async fn currently_playing(&self, token: &AccessToken) -> Result<Option<Track>> {
        self.authorize(token).await?;
        let context = self
            .spotify
            .current_playing(None, Some(&[AdditionalType::Track]))
            .await
            .map_err(Error::from_client)?;

        // 204 No Content comes back as None
        let Some(context) = context else {
            debug!("Nothing is playing right now");
            return Ok(None);
        };
        match context.item {
            Some(PlayableItem::Track(track)) => Ok(Some(Track::try_from(track)?)),
            Some(_) => {
                debug!("Currently playing item is not a track");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn recently_played(&self, token: &AccessToken, limit: u32) -> Result<Vec<Track>> {
        self.authorize(token).await?;
        let page = self
            .spotify
            .current_user_recently_played(Some(limit), None)
            .await
            .map_err(Error::from_client)?;
        let tracks = convert_tracks(page.items.into_iter().map(|history| history.track));
        debug!("Fetched {} recently played tracks", tracks.len());
        Ok(tracks)
    }

    async fn top_tracks(
        &self,
        token: &AccessToken,
        limit: u32,
        range: TopRange,
    ) -> Result<Vec<Track>> {
        self.authorize(token).await?;
        let page = self
            .spotify
            .current_user_top_tracks_manual(Some(range.into()), Some(limit), None)
            .await
            .map_err(Error::from_client)?;
        let tracks = convert_tracks(page.items);
        debug!("Fetched {} top tracks", tracks.len());
        Ok(tracks)
    }
}
