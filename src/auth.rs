//! Keeps a Spotify access token fresh.
//!
//! [`TokenManager`] publishes the current token on a watch channel and, once
//! spawned, refreshes it shortly before it expires.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use crate::clients::TokenSource;
use crate::clients::entities::{AccessToken, TokenGrant};
use crate::clients::errors::Result;
use crate::config::Settings;

/// Longest lifetime accepted from a grant; Spotify issues one-hour tokens.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// An access token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct TokenData {
    /// Bearer token.
    pub access_token: AccessToken,
    /// First instant at which the token must not be used.
    pub expires_at: Instant,
}

impl TokenData {
    /// Anchors a grant's relative lifetime at `received_at`, capped at one day.
    pub fn from_grant(grant: TokenGrant, received_at: Instant) -> Self {
        TokenData {
            access_token: grant.access_token,
            expires_at: received_at + grant.expires_in.min(MAX_TOKEN_LIFETIME),
        }
    }

    /// Whether the token has expired at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// The token, if it can still be used at `now`.
    pub fn usable(&self, now: Instant) -> Option<&AccessToken> {
        (!self.is_expired(now)).then_some(&self.access_token)
    }

    /// How long to wait from `now` before refreshing.
    ///
    /// Normally `threshold` before expiry. A token whose remaining lifetime is
    /// already inside the threshold is refreshed after half of what is left.
    pub fn refresh_delay(&self, threshold: Duration, now: Instant) -> Duration {
        let remaining = self.expires_at.saturating_duration_since(now);
        if remaining > threshold {
            remaining - threshold
        } else {
            remaining / 2
        }
    }
}

/// The usable token in a published slot, if any.
pub fn usable_token(slot: &Option<TokenData>, now: Instant) -> Option<AccessToken> {
    slot.as_ref().and_then(|t| t.usable(now)).cloned()
}

/// Refreshes and publishes access tokens.
pub struct TokenManager<S> {
    source: Arc<S>,
    refresh_threshold: Duration,
    retry_delay: Duration,
    sender: watch::Sender<Option<TokenData>>,
}

impl<S: TokenSource> TokenManager<S> {
    /// A manager with nothing published yet.
    pub fn new(source: Arc<S>, refresh_threshold: Duration, retry_delay: Duration) -> Self {
        let (sender, _) = watch::channel(None);
        TokenManager {
            source,
            refresh_threshold,
            retry_delay,
            sender,
        }
    }

    /// A manager using the refresh timings from `settings`.
    pub fn from_settings(source: Arc<S>, settings: &Settings) -> Self {
        Self::new(source, settings.refresh_threshold, settings.retry_delay)
    }

    /// Receives every token published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Option<TokenData>> {
        self.sender.subscribe()
    }

    /// The published token, if it has not expired.
    pub fn current(&self) -> Option<AccessToken> {
        usable_token(&self.sender.borrow(), Instant::now())
    }

    /// Fetches a new token and publishes it.
    ///
    /// On failure the previously published token stays in place.
    pub async fn refresh(&self) -> Result<TokenData> {
        let grant = self.source.fetch_token().await.inspect_err(|e| {
            error!("Error refreshing Spotify token: {e}");
        })?;
        let token = TokenData::from_grant(grant, Instant::now());
        self.sender.send_replace(Some(token.clone()));
        info!("Spotify access token refreshed");
        Ok(token)
    }

    /// Runs the refresh loop in the background until the handle is dropped.
    pub fn spawn(self) -> TokenHandle {
        let receiver = self.subscribe();
        let task = tokio::spawn(self.run());
        TokenHandle { receiver, task }
    }

    async fn run(self) {
        loop {
            let delay = match self.refresh().await {
                Ok(token) if token.is_expired(Instant::now()) => {
                    warn!("Spotify issued an already expired token");
                    self.retry_delay
                }
                Ok(token) => token.refresh_delay(self.refresh_threshold, Instant::now()),
                Err(_) => self.retry_delay,
            };
            debug!("Next token refresh in {delay:?}");
            sleep(delay).await;
        }
    }
}

/// Handle to a running refresh loop. Dropping it stops the loop.
pub struct TokenHandle {
    receiver: watch::Receiver<Option<TokenData>>,
    task: JoinHandle<()>,
}

impl TokenHandle {
    /// Receives every token the loop publishes.
    pub fn subscribe(&self) -> watch::Receiver<Option<TokenData>> {
        self.receiver.clone()
    }

    /// The published token, if it has not expired.
    pub fn current(&self) -> Option<AccessToken> {
        usable_token(&self.receiver.borrow(), Instant::now())
    }
}

impl Drop for TokenHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
