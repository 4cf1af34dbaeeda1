use rspotify::ClientError;
use rspotify::http::HttpError;
use thiserror::Error;

/// HTTP status Spotify answers with once the rate limit is hit.
const TOO_MANY_REQUESTS: u16 = 429;

/// Errors produced by nowplaying.
#[derive(Error, Debug)]
pub enum Error {
    /// Error returned by the Spotify Web API client.
    #[error("Spotify error: {0}")]
    SpotifyError(#[from] ClientError),

    /// Spotify answered with HTTP 429.
    #[error("Spotify API rate limit reached")]
    RateLimited,

    /// The access token could not be obtained or used.
    #[error("Token error: {0}")]
    TokenError(String),

    /// Spotify answered with something we could not make sense of.
    #[error("Spotify API unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Socket or terminal I/O failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Converts an rspotify error, singling out HTTP 429.
    pub fn from_client(err: ClientError) -> Self {
        let rate_limited = matches!(
            &err,
            ClientError::Http(http) if matches!(
                http.as_ref(),
                HttpError::StatusCode(response) if response.status().as_u16() == TOO_MANY_REQUESTS
            )
        );
        if rate_limited {
            Error::RateLimited
        } else {
            Error::SpotifyError(err)
        }
    }

    /// Whether the request was rejected by Spotify's rate limiter.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited)
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}
