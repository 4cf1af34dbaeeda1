//! Nowplaying - the engine behind a "Currently Playing" music panel
//!
//! This library keeps a Spotify access token fresh, fetches the currently
//! playing, recently played and top tracks, caches the slow-moving lists and
//! composes everything into a two-tab panel.

/// Access token refresh
pub mod auth;
/// TTL cache for fetched track lists
pub mod cache;
/// Client modules for interacting with the Spotify Web API
pub mod clients;
/// Settings and environment loading
pub mod config;
/// Fetching, caching and polling of the listening history
pub mod feed;
/// Panel composition and text rendering
pub mod panel;
/// JSON endpoint
pub mod server;

#[cfg(test)]
pub(crate) mod testing;
