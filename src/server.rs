//! Read-only JSON endpoint for the site's front end.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use log::{info, warn};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::auth::{TokenData, usable_token};
use crate::clients::TrackSource;
use crate::clients::entities::ListKind;
use crate::clients::errors::Result;
use crate::feed::{FeedState, TrackFeed};
use crate::panel::{Panel, PanelView};

/// Shared state of the router.
pub struct AppState<S> {
    feed: Arc<TrackFeed<S>>,
    tokens: watch::Receiver<Option<TokenData>>,
    display_len: usize,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            feed: self.feed.clone(),
            tokens: self.tokens.clone(),
            display_len: self.display_len,
        }
    }
}

impl<S> AppState<S> {
    /// State over a running feed and the token channel it consumes.
    pub fn new(
        feed: Arc<TrackFeed<S>>,
        tokens: watch::Receiver<Option<TokenData>>,
        display_len: usize,
    ) -> Self {
        AppState {
            feed,
            tokens,
            display_len,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TabQuery {
    #[serde(default)]
    tab: ListKind,
}

/// Builds the router.
pub fn router<S: TrackSource>(state: AppState<S>) -> Router {
    Router::new()
        .route("/api/now-playing", get(now_playing::<S>))
        .route("/api/state", get(feed_state::<S>))
        .route("/api/refresh", post(refresh::<S>))
        .with_state(state)
}

/// Serves the router on `addr` until the process is interrupted.
pub async fn serve<S: TrackSource>(addr: &str, state: AppState<S>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
            }
        })
        .await?;
    Ok(())
}

async fn now_playing<S: TrackSource>(
    State(state): State<AppState<S>>,
    Query(query): Query<TabQuery>,
) -> Json<PanelView> {
    let panel = Panel::new(query.tab, state.display_len);
    Json(panel.view(&state.feed.snapshot()))
}

async fn feed_state<S: TrackSource>(State(state): State<AppState<S>>) -> Json<FeedState> {
    Json(state.feed.snapshot())
}

async fn refresh<S: TrackSource>(
    State(state): State<AppState<S>>,
    Query(query): Query<TabQuery>,
) -> std::result::Result<Json<PanelView>, StatusCode> {
    let token = usable_token(&state.tokens.borrow(), Instant::now());
    let Some(token) = token else {
        warn!("Refresh requested without a usable token");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    let panel = Panel::new(query.tab, state.display_len);
    panel.refresh(&*state.feed, &token).await;
    Ok(Json(panel.view(&state.feed.snapshot())))
}
