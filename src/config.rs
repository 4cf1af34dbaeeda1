use std::path::PathBuf;
use std::time::Duration;

use log::debug;

use crate::clients::entities::TopRange;
use crate::clients::errors::{Error, Result};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(5 * 60);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_LIST_LIMIT: u32 = 10;
const DEFAULT_DISPLAY_LEN: usize = 4;
const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
/// Spotify rejects larger page sizes.
const MAX_LIST_LIMIT: u32 = 50;

/// App credentials plus the long-lived refresh token of the account shown on the panel.
#[derive(Clone)]
pub struct SpotifyCredentials {
    /// Spotify app client id.
    pub client_id: String,
    /// Spotify app client secret.
    pub client_secret: String,
    /// Refresh token issued to the app for the panel's account.
    pub refresh_token: String,
}

/// Runtime settings.
#[derive(Clone)]
pub struct Settings {
    /// `None` when the Spotify variables are not set.
    pub credentials: Option<SpotifyCredentials>,
    /// How long recent/top lists are served from the cache.
    pub cache_ttl: Duration,
    /// Interval between "currently playing" polls.
    pub poll_interval: Duration,
    /// How long before expiry the access token is refreshed.
    pub refresh_threshold: Duration,
    /// Delay before retrying a failed token refresh.
    pub retry_delay: Duration,
    /// Number of tracks requested per list.
    pub list_limit: u32,
    /// Number of tracks shown under the featured one.
    pub display_len: usize,
    /// Time window of the top tracks list.
    pub top_range: TopRange,
}

impl Settings {
    /// The Spotify credentials, or a configuration error naming the missing variables.
    pub fn credentials(&self) -> Result<&SpotifyCredentials> {
        self.credentials.as_ref().ok_or_else(|| {
            Error::ConfigurationError(
                "Missing Spotify credentials. Set SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REFRESH_TOKEN.".into(),
            )
        })
    }
}

/// Loads `.env` from the working directory and from the user config directory.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {path:?}"),
        Err(e) => debug!("No .env in working directory: {e}"),
    }
    let path = user_env_path();
    if let Err(e) = dotenvy::from_path(&path) {
        debug!("No environment file at {path:?}: {e}");
    }
}

fn user_env_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".")) // Fallback to the working directory if config directory can't be determined
        .join("nowplaying")
        .join(".env")
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::ConfigurationError(format!("{name} must be a number, got {value:?}")))
}

fn check_duration(name: &str, duration: Duration) -> Result<Duration> {
    if duration.is_zero() || duration > MAX_DURATION {
        return Err(Error::ConfigurationError(format!(
            "{name} must be between 1 and {} seconds, got {}",
            MAX_DURATION.as_secs(),
            duration.as_secs()
        )));
    }
    Ok(duration)
}

fn parse_secs(name: &str, value: &str) -> Result<Duration> {
    check_duration(name, Duration::from_secs(parse_number(name, value)?))
}

fn parse_list_limit(value: &str) -> Result<u32> {
    let name = "NOWPLAYING_LIST_LIMIT";
    match parse_number(name, value)? {
        limit @ 1..=MAX_LIST_LIMIT => Ok(limit),
        limit => Err(Error::ConfigurationError(format!(
            "{name} must be between 1 and {MAX_LIST_LIMIT}, got {limit}"
        ))),
    }
}

/// Builder for [`Settings`]. Unset fields are read from the environment on build.
#[derive(Default)]
pub struct ConfigBuilder {
    cache_ttl: Option<Duration>,
    poll_interval: Option<Duration>,
    top_range: Option<TopRange>,
}

impl ConfigBuilder {
    /// A builder with nothing overridden.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the cache TTL.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Overrides the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Overrides the top tracks time window.
    #[must_use]
    pub fn top_range(mut self, range: TopRange) -> Self {
        self.top_range = Some(range);
        self
    }

    /// Builds settings from the process environment.
    pub fn build(self) -> Result<Settings> {
        self.build_with(|name| std::env::var(name).ok())
    }

    /// Builds settings reading variables through `lookup`.
    pub fn build_with(self, lookup: impl Fn(&str) -> Option<String>) -> Result<Settings> {
        let secs = |name: &str, default: Duration| -> Result<Duration> {
            lookup(name).map_or(Ok(default), |v| parse_secs(name, &v))
        };

        let credentials = match (
            lookup("SPOTIFY_CLIENT_ID"),
            lookup("SPOTIFY_CLIENT_SECRET"),
            lookup("SPOTIFY_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Some(SpotifyCredentials {
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            _ => None,
        };

        let cache_ttl = match self.cache_ttl {
            Some(ttl) => check_duration("cache TTL", ttl)?,
            None => secs("NOWPLAYING_CACHE_TTL_SECS", DEFAULT_CACHE_TTL)?,
        };
        let poll_interval = match self.poll_interval {
            Some(interval) => check_duration("poll interval", interval)?,
            None => secs("NOWPLAYING_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?,
        };

        let top_range = match self.top_range {
            Some(range) => range,
            None => match lookup("NOWPLAYING_TOP_RANGE") {
                Some(value) => TopRange::parse(&value).ok_or_else(|| {
                    Error::ConfigurationError(format!(
                        "NOWPLAYING_TOP_RANGE must be short_term, medium_term or long_term, got {value:?}"
                    ))
                })?,
                None => TopRange::default(),
            },
        };

        Ok(Settings {
            credentials,
            cache_ttl,
            poll_interval,
            refresh_threshold: secs("NOWPLAYING_REFRESH_THRESHOLD_SECS", DEFAULT_REFRESH_THRESHOLD)?,
            retry_delay: secs("NOWPLAYING_RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY)?,
            list_limit: lookup("NOWPLAYING_LIST_LIMIT")
                .map_or(Ok(DEFAULT_LIST_LIMIT), |v| parse_list_limit(&v))?,
            display_len: lookup("NOWPLAYING_DISPLAY_LEN")
                .map_or(Ok(DEFAULT_DISPLAY_LEN), |v| parse_number("NOWPLAYING_DISPLAY_LEN", &v))?,
            top_range,
        })
    }
}
