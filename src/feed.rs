//! Listening-history feed: fetches the three track lists, caches the slow
//! ones, polls the current track and publishes the combined state.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::auth::{TokenData, usable_token};
use crate::cache::TtlCache;
use crate::clients::TrackSource;
use crate::clients::entities::{AccessToken, Endpoint, ListKind, TopRange, Track};
use crate::clients::errors::Error;
use crate::config::Settings;

/// Shown instead of the generic message when Spotify answers with HTTP 429.
pub const RATE_LIMITED_MESSAGE: &str = "Rate limited by Spotify API. Please wait before retrying.";

/// One value per endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerEndpoint<T> {
    /// Value for the currently playing track.
    pub current: T,
    /// Value for the recently played list.
    pub recent: T,
    /// Value for the top tracks list.
    pub top: T,
}

impl<T> PerEndpoint<T> {
    /// The value for `endpoint`.
    pub fn get(&self, endpoint: Endpoint) -> &T {
        match endpoint {
            Endpoint::Current => &self.current,
            Endpoint::Recent => &self.recent,
            Endpoint::Top => &self.top,
        }
    }

    /// The value for `endpoint`, mutably.
    pub fn get_mut(&mut self, endpoint: Endpoint) -> &mut T {
        match endpoint {
            Endpoint::Current => &mut self.current,
            Endpoint::Recent => &mut self.recent,
            Endpoint::Top => &mut self.top,
        }
    }
}

/// Everything the panel needs, replaced piecewise as fetches complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedState {
    /// Track playing right now.
    pub current_track: Option<Track>,
    /// Recently played tracks, newest first.
    pub recent_tracks: Vec<Track>,
    /// Top tracks, highest ranked first.
    pub top_tracks: Vec<Track>,
    /// Whether a request is in flight, per endpoint.
    pub is_loading: PerEndpoint<bool>,
    /// Last error message, per endpoint.
    pub error: PerEndpoint<Option<String>>,
}

impl FeedState {
    /// The list shown under `kind`'s tab.
    pub fn list(&self, kind: ListKind) -> &[Track] {
        match kind {
            ListKind::Recent => &self.recent_tracks,
            ListKind::Top => &self.top_tracks,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut Vec<Track> {
        match kind {
            ListKind::Recent => &mut self.recent_tracks,
            ListKind::Top => &mut self.top_tracks,
        }
    }

    /// Whether all three endpoints are loading at once.
    pub fn all_loading(&self) -> bool {
        self.is_loading.current && self.is_loading.recent && self.is_loading.top
    }
}

fn error_message(endpoint: Endpoint, err: &Error) -> String {
    if err.is_rate_limited() {
        RATE_LIMITED_MESSAGE.to_string()
    } else {
        endpoint.error_message().to_string()
    }
}

/// Tunables of a [`TrackFeed`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// How long recent/top lists are served from the cache.
    pub cache_ttl: Duration,
    /// Interval between "currently playing" polls.
    pub poll_interval: Duration,
    /// Tracks requested per list.
    pub list_limit: u32,
    /// Time window of the top tracks list.
    pub top_range: TopRange,
}

impl From<&Settings> for FeedConfig {
    fn from(settings: &Settings) -> Self {
        FeedConfig {
            cache_ttl: settings.cache_ttl,
            poll_interval: settings.poll_interval,
            list_limit: settings.list_limit,
            top_range: settings.top_range,
        }
    }
}

/// Fetches, caches and publishes the listening history.
pub struct TrackFeed<S> {
    source: Arc<S>,
    config: FeedConfig,
    cache: Mutex<TtlCache<ListKind, Vec<Track>>>,
    state: watch::Sender<FeedState>,
}

impl<S: TrackSource> TrackFeed<S> {
    /// An empty feed reading from `source`.
    pub fn new(source: Arc<S>, config: FeedConfig) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        TrackFeed {
            source,
            cache: Mutex::new(TtlCache::new(config.cache_ttl)),
            config,
            state,
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Receives every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    fn start_loading(&self, endpoint: Endpoint) {
        self.state.send_modify(|state| {
            *state.is_loading.get_mut(endpoint) = true;
            *state.error.get_mut(endpoint) = None;
        });
    }

    /// Fetches the track playing right now.
    pub async fn fetch_current(&self, token: &AccessToken) {
        self.start_loading(Endpoint::Current);
        let result = self.source.currently_playing(token).await;
        self.state.send_modify(|state| {
            state.is_loading.current = false;
            match result {
                Ok(track) => {
                    debug!("Current track: {:?}", track.as_ref().map(|t| &t.name));
                    state.current_track = track;
                }
                Err(e) => {
                    warn!("Error fetching current track: {e}");
                    state.current_track = None;
                    state.error.current = Some(error_message(Endpoint::Current, &e));
                }
            }
        });
    }

    /// Fetches one list, serving it from the cache while fresh unless `force` is set.
    pub async fn fetch_list(&self, kind: ListKind, token: &AccessToken, force: bool) {
        let endpoint = Endpoint::from(kind);
        if !force {
            let cache = self.cache.lock().await;
            if let Some(tracks) = cache.get_fresh(&kind, Instant::now()) {
                debug!("Serving {kind:?} tracks from cache");
                let tracks = tracks.clone();
                drop(cache);
                self.state.send_modify(|state| *state.list_mut(kind) = tracks);
                return;
            }
        }

        self.start_loading(endpoint);
        let result = match kind {
            ListKind::Recent => {
                self.source
                    .recently_played(token, self.config.list_limit)
                    .await
            }
            ListKind::Top => {
                self.source
                    .top_tracks(token, self.config.list_limit, self.config.top_range)
                    .await
            }
        };

        match result {
            Ok(tracks) => {
                debug!("Fetched {} {kind:?} tracks", tracks.len());
                self.cache
                    .lock()
                    .await
                    .insert(kind, tracks.clone(), Instant::now());
                self.state.send_modify(|state| {
                    *state.list_mut(kind) = tracks;
                    *state.is_loading.get_mut(endpoint) = false;
                });
            }
            Err(e) => {
                warn!("{}: {e}", endpoint.error_message());
                // The previous list stays on screen
                self.state.send_modify(|state| {
                    *state.is_loading.get_mut(endpoint) = false;
                    *state.error.get_mut(endpoint) = Some(error_message(endpoint, &e));
                });
            }
        }
    }

    /// [`TrackFeed::fetch_list`] for the recently played list.
    pub async fn fetch_recent(&self, token: &AccessToken, force: bool) {
        self.fetch_list(ListKind::Recent, token, force).await;
    }

    /// [`TrackFeed::fetch_list`] for the top tracks list.
    pub async fn fetch_top(&self, token: &AccessToken, force: bool) {
        self.fetch_list(ListKind::Top, token, force).await;
    }

    /// Fetches all three endpoints concurrently, lists through the cache.
    pub async fn refresh_all(&self, token: &AccessToken) {
        futures::join!(
            self.fetch_current(token),
            self.fetch_recent(token, false),
            self.fetch_top(token, false),
        );
    }

    /// Refetches every list whose cache entry went stale.
    pub async fn refresh_stale(&self, token: &AccessToken) {
        let stale = self.cache.lock().await.stale_keys(Instant::now());
        for kind in stale {
            debug!("Cached {kind:?} tracks are stale, refetching");
            self.fetch_list(kind, token, true).await;
        }
    }

    /// Forces the list behind `kind`'s tab and refetches the current track.
    pub async fn refresh_tab(&self, kind: ListKind, token: &AccessToken) {
        futures::join!(self.fetch_list(kind, token, true), self.fetch_current(token));
    }

    /// Runs the poll loop in the background until the handle is dropped or
    /// the token channel closes.
    pub fn spawn(self: Arc<Self>, tokens: watch::Receiver<Option<TokenData>>) -> FeedHandle {
        let task = tokio::spawn(self.run(tokens));
        FeedHandle { task }
    }

    async fn run(self: Arc<Self>, mut tokens: watch::Receiver<Option<TokenData>>) {
        let first = tokens
            .wait_for(|slot| usable_token(slot, Instant::now()).is_some())
            .await
            .ok()
            .and_then(|slot| usable_token(&slot, Instant::now()));
        let Some(token) = first else {
            debug!("Token channel closed before a token arrived");
            return;
        };
        info!("Starting track feed");
        self.refresh_all(&token).await;

        let cache_ttl = self.cache.lock().await.ttl();
        let start = Instant::now();
        let mut poll = interval_at(start + self.config.poll_interval, self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cache_check = interval_at(start + cache_ttl, cache_ttl);
        cache_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = tokens.changed() => {
                    if changed.is_err() {
                        debug!("Token channel closed, stopping track feed");
                        return;
                    }
                    let token = usable_token(&tokens.borrow_and_update(), Instant::now());
                    if let Some(token) = token {
                        self.refresh_all(&token).await;
                    }
                }
                _ = poll.tick() => {
                    let token = usable_token(&tokens.borrow(), Instant::now());
                    match token {
                        Some(token) => self.fetch_current(&token).await,
                        None => debug!("No usable token, skipping current track poll"),
                    }
                }
                _ = cache_check.tick() => {
                    let token = usable_token(&tokens.borrow(), Instant::now());
                    match token {
                        Some(token) => self.refresh_stale(&token).await,
                        None => debug!("No usable token, skipping cache check"),
                    }
                }
            }
        }
    }
}

/// Handle to a running feed loop. Dropping it stops the loop.
pub struct FeedHandle {
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Whether the loop has ended on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
