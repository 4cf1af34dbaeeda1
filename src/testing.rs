//! In-memory stand-ins for the Spotify clients.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::clients::entities::{AccessToken, TokenGrant, TopRange, Track};
use crate::clients::errors::{Error, Result};
use crate::clients::{TokenSource, TrackSource};

pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Song {id}"),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        album_image_url: Some(format!("https://i.scdn.co/image/{id}")),
        spotify_url: format!("https://open.spotify.com/track/{id}"),
    }
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

pub struct FakeTokenSource {
    lifetime: Duration,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeTokenSource {
    pub fn new(lifetime: Duration) -> Self {
        FakeTokenSource {
            lifetime,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl TokenSource for FakeTokenSource {
    async fn fetch_token(&self) -> Result<TokenGrant> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::TokenError("refresh rejected".into()));
        }
        Ok(TokenGrant {
            access_token: AccessToken::new(format!("token-{call}")),
            expires_in: self.lifetime,
        })
    }
}

/// What a fake endpoint answers with.
#[derive(Clone)]
pub enum Reply<T> {
    Ok(T),
    RateLimited,
    Fails,
}

impl<T: Clone> Reply<T> {
    fn to_result(&self) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::RateLimited => Err(Error::RateLimited),
            Reply::Fails => Err(Error::UnexpectedResponse("boom".into())),
        }
    }
}

pub struct FakeTrackSource {
    current: Mutex<Reply<Option<Track>>>,
    recent: Mutex<Reply<Vec<Track>>>,
    top: Mutex<Reply<Vec<Track>>>,
    current_calls: AtomicUsize,
    recent_calls: AtomicUsize,
    top_calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl FakeTrackSource {
    pub fn new(current: Option<Track>, recent: Vec<Track>, top: Vec<Track>) -> Self {
        FakeTrackSource {
            current: Mutex::new(Reply::Ok(current)),
            recent: Mutex::new(Reply::Ok(recent)),
            top: Mutex::new(Reply::Ok(top)),
            current_calls: AtomicUsize::new(0),
            recent_calls: AtomicUsize::new(0),
            top_calls: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn set_current(&self, reply: Reply<Option<Track>>) {
        *self.current.lock().unwrap() = reply;
    }

    pub fn set_recent(&self, reply: Reply<Vec<Track>>) {
        *self.recent.lock().unwrap() = reply;
    }

    pub fn set_top(&self, reply: Reply<Vec<Track>>) {
        *self.top.lock().unwrap() = reply;
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn recent_calls(&self) -> usize {
        self.recent_calls.load(Ordering::SeqCst)
    }

    pub fn top_calls(&self) -> usize {
        self.top_calls.load(Ordering::SeqCst)
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }

    fn record(&self, token: &AccessToken) {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(token.as_str().to_string());
    }
}

impl TrackSource for FakeTrackSource {
    async fn currently_playing(&self, token: &AccessToken) -> Result<Option<Track>> {
        self.record(token);
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.current.lock().unwrap().clone();
        reply.to_result()
    }

    async fn recently_played(&self, token: &AccessToken, limit: u32) -> Result<Vec<Track>> {
        self.record(token);
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.recent.lock().unwrap().clone();
        reply
            .to_result()
            .map(|t| t.into_iter().take(limit as usize).collect())
    }

    async fn top_tracks(
        &self,
        token: &AccessToken,
        limit: u32,
        _range: TopRange,
    ) -> Result<Vec<Track>> {
        self.record(token);
        self.top_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.top.lock().unwrap().clone();
        reply
            .to_result()
            .map(|t| t.into_iter().take(limit as usize).collect())
    }
}
