//! Turns a [`FeedState`] into what the "Currently Playing" panel shows.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::clients::TrackSource;
use crate::clients::entities::{AccessToken, ListKind, Track};
use crate::feed::{FeedState, TrackFeed};

/// Panel title.
pub const PANEL_TITLE: &str = "Currently Playing";

/// Tracks shown under the featured one unless configured otherwise.
pub const DEFAULT_DISPLAY_LEN: usize = 4;

/// Tab state of the panel.
#[derive(Debug, Clone, Copy)]
pub struct Panel {
    active: ListKind,
    display_len: usize,
}

impl Default for Panel {
    fn default() -> Self {
        Panel::new(ListKind::default(), DEFAULT_DISPLAY_LEN)
    }
}

impl Panel {
    /// A panel starting on `active`.
    ///
    /// Lists at most `display_len` tracks, except under the #1 top track
    /// where the whole top list follows.
    pub fn new(active: ListKind, display_len: usize) -> Self {
        Panel {
            active,
            display_len,
        }
    }

    /// The selected tab.
    pub fn active(&self) -> ListKind {
        self.active
    }

    /// Selects `kind`; returns whether the tab changed.
    pub fn switch_tab(&mut self, kind: ListKind) -> bool {
        let changed = self.active != kind;
        self.active = kind;
        changed
    }

    /// The refresh button: forces the active list and refetches the current track.
    pub async fn refresh<S: TrackSource>(&self, feed: &TrackFeed<S>, token: &AccessToken) {
        feed.refresh_tab(self.active, token).await;
    }

    /// Composes the panel for `state`.
    pub fn view(&self, state: &FeedState) -> PanelView {
        if state.all_loading() {
            return PanelView::Loading { tab: self.active };
        }

        let list = state.list(self.active);
        let rest = list.get(1..).unwrap_or_default();
        // Under the #1 track every other top track is listed
        let (heading, featured, rest, limit) = match (&state.current_track, self.active) {
            (Some(current), _) => (
                Heading::NowPlaying,
                Some(current.clone()),
                list,
                self.display_len,
            ),
            (None, ListKind::Top) => (Heading::TopTrack, list.first().cloned(), rest, usize::MAX),
            (None, ListKind::Recent) => (
                Heading::RecentlyPlayed,
                list.first().cloned(),
                rest,
                self.display_len,
            ),
        };
        let tracks = distinct_tracks(rest, featured.as_ref(), limit);

        let errors = [state.error.current.as_ref(), state.error.get(self.active.into()).as_ref()]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        PanelView::Ready(PanelContent {
            tab: self.active,
            heading,
            featured,
            tracks,
            list_loading: state.is_loading.recent || state.is_loading.top,
            errors,
        })
    }
}

/// Up to `limit` tracks from `tracks`, skipping repeats and the featured track.
fn distinct_tracks(tracks: &[Track], featured: Option<&Track>, limit: usize) -> Vec<Track> {
    let mut seen: HashSet<&str> = featured.map(|t| t.id.as_str()).into_iter().collect();
    tracks
        .iter()
        .filter(|t| seen.insert(t.id.as_str()))
        .take(limit)
        .cloned()
        .collect()
}

/// Label above the featured track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Heading {
    /// Something is playing right now.
    NowPlaying,
    /// Nothing playing, top tracks tab.
    TopTrack,
    /// Nothing playing, recently played tab.
    RecentlyPlayed,
}

impl Heading {
    /// Display text.
    pub fn text(self) -> &'static str {
        match self {
            Heading::NowPlaying => "Now Playing",
            Heading::TopTrack => "#1 Track This Month",
            Heading::RecentlyPlayed => "Recently Played",
        }
    }
}

/// A composed panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelView {
    /// Every endpoint is still loading; show a skeleton.
    Loading {
        /// Selected tab.
        tab: ListKind,
    },
    /// Something to show.
    Ready(PanelContent),
}

/// Contents of a ready panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelContent {
    /// Selected tab.
    pub tab: ListKind,
    /// Label above the featured track.
    pub heading: Heading,
    /// The big track.
    pub featured: Option<Track>,
    /// Tracks listed beside the featured one.
    pub tracks: Vec<Track>,
    /// Whether a list is being fetched; the list area shows a skeleton meanwhile.
    pub list_loading: bool,
    /// Messages to show, current track first.
    pub errors: Vec<String>,
}

fn write_tabs(f: &mut fmt::Formatter<'_>, active: ListKind) -> fmt::Result {
    let tabs = [ListKind::Recent, ListKind::Top].map(|kind| {
        if kind == active {
            format!("[{}]", kind.label())
        } else {
            format!(" {} ", kind.label())
        }
    });
    writeln!(f, "{PANEL_TITLE}    {}", tabs.join(" "))
}

fn write_track(f: &mut fmt::Formatter<'_>, prefix: &str, track: &Track) -> fmt::Result {
    writeln!(f, "{prefix}{} - {} ({})", track.name, track.artist, track.album)
}

impl fmt::Display for PanelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelView::Loading { tab } => {
                write_tabs(f, *tab)?;
                writeln!(f, "Loading ...")
            }
            PanelView::Ready(content) => {
                write_tabs(f, content.tab)?;
                for error in &content.errors {
                    writeln!(f, "! {error}")?;
                }
                writeln!(f)?;
                writeln!(f, "{}", content.heading.text())?;
                match &content.featured {
                    Some(track) => {
                        write_track(f, "  > ", track)?;
                        writeln!(f, "    {}", track.spotify_url)?;
                    }
                    None => writeln!(f, "  (nothing to show)")?,
                }
                writeln!(f)?;
                if content.list_loading {
                    return writeln!(f, "Loading tracks ...");
                }
                for (position, track) in content.tracks.iter().enumerate() {
                    write_track(f, &format!("  {}. ", position + 1), track)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{track, tracks};

    fn state(current: Option<Track>, recent: Vec<Track>, top: Vec<Track>) -> FeedState {
        FeedState {
            current_track: current,
            recent_tracks: recent,
            top_tracks: top,
            ..FeedState::default()
        }
    }

    fn content(view: PanelView) -> PanelContent {
        match view {
            PanelView::Ready(content) => content,
            PanelView::Loading { .. } => panic!("panel is still loading"),
        }
    }

    #[test]
    fn current_track_is_featured_over_lists() {
        let state = state(
            Some(track("now")),
            tracks(&["r1", "r2", "r3", "r4", "r5"]),
            tracks(&["t1", "t2"]),
        );
        let panel = Panel::default();

        let view = content(panel.view(&state));
        assert_eq!(view.heading, Heading::NowPlaying);
        assert_eq!(view.featured, Some(track("now")));
        assert_eq!(view.tracks, tracks(&["r1", "r2", "r3", "r4"]));

        let view = content(Panel::new(ListKind::Top, 4).view(&state));
        assert_eq!(view.heading, Heading::NowPlaying);
        assert_eq!(view.tracks, tracks(&["t1", "t2"]));
    }

    #[test]
    fn current_track_is_not_repeated_in_list() {
        let state = state(
            Some(track("r1")),
            tracks(&["r1", "r2", "r3", "r4", "r5"]),
            vec![],
        );
        let view = content(Panel::default().view(&state));
        assert_eq!(view.tracks, tracks(&["r2", "r3", "r4", "r5"]));
    }

    #[test]
    fn most_recent_track_is_featured_when_idle() {
        let state = state(None, tracks(&["r1", "r2", "r3", "r4", "r5", "r6"]), vec![]);
        let view = content(Panel::default().view(&state));
        assert_eq!(view.heading, Heading::RecentlyPlayed);
        assert_eq!(view.featured, Some(track("r1")));
        assert_eq!(view.tracks, tracks(&["r2", "r3", "r4", "r5"]));
    }

    #[test]
    fn top_track_is_featured_on_top_tab_when_idle() {
        let state = state(None, tracks(&["r1"]), tracks(&["t1", "t2", "t3"]));
        let view = content(Panel::new(ListKind::Top, 4).view(&state));
        assert_eq!(view.heading, Heading::TopTrack);
        assert_eq!(view.heading.text(), "#1 Track This Month");
        assert_eq!(view.featured, Some(track("t1")));
        assert_eq!(view.tracks, tracks(&["t2", "t3"]));
    }

    #[test]
    fn whole_top_list_follows_top_track_when_idle() {
        let top = tracks(&["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10"]);
        let state = state(None, tracks(&["r1", "r2", "r3", "r4", "r5", "r6"]), top.clone());

        let view = content(Panel::new(ListKind::Top, 4).view(&state));
        assert_eq!(view.featured, Some(track("t1")));
        assert_eq!(view.tracks.len(), 9);
        assert_eq!(view.tracks, top[1..]);

        // Capped again once something plays
        let mut playing = state;
        playing.current_track = Some(track("now"));
        let view = content(Panel::new(ListKind::Top, 4).view(&playing));
        assert_eq!(view.tracks, tracks(&["t1", "t2", "t3", "t4"]));
    }

    #[test]
    fn repeated_plays_collapse() {
        let state = state(
            None,
            tracks(&["r1", "r1", "r2", "r2", "r1", "r3", "r4", "r5"]),
            vec![],
        );
        let view = content(Panel::default().view(&state));
        assert_eq!(view.featured, Some(track("r1")));
        assert_eq!(view.tracks, tracks(&["r2", "r3", "r4", "r5"]));
    }

    #[test]
    fn empty_lists_show_nothing() {
        let view = Panel::default().view(&FeedState::default());
        assert!(view.to_string().contains("(nothing to show)"));

        let view = content(view);
        assert_eq!(view.featured, None);
        assert!(view.tracks.is_empty());
    }

    #[test]
    fn all_endpoints_loading_shows_skeleton() {
        let mut state = FeedState::default();
        state.is_loading.current = true;
        state.is_loading.recent = true;
        state.is_loading.top = true;
        assert_eq!(
            Panel::default().view(&state),
            PanelView::Loading {
                tab: ListKind::Recent
            }
        );

        state.is_loading.current = false;
        let view = content(Panel::default().view(&state));
        assert!(view.list_loading);
    }

    #[test]
    fn errors_follow_active_tab() {
        let mut state = state(None, tracks(&["r1"]), tracks(&["t1"]));
        state.error.current = Some("Error fetching current track".into());
        state.error.top = Some("Error fetching top tracks".into());

        let recent = content(Panel::default().view(&state));
        assert_eq!(recent.errors, vec!["Error fetching current track"]);

        let top = content(Panel::new(ListKind::Top, 4).view(&state));
        assert_eq!(
            top.errors,
            vec!["Error fetching current track", "Error fetching top tracks"]
        );
    }

    #[test]
    fn switching_tabs_reports_change() {
        let mut panel = Panel::default();
        assert_eq!(panel.active(), ListKind::Recent);
        assert!(panel.switch_tab(ListKind::Top));
        assert!(!panel.switch_tab(ListKind::Top));
        assert_eq!(panel.active(), ListKind::Top);
    }

    #[test]
    fn text_rendering_marks_active_tab() {
        let state = state(Some(track("now")), tracks(&["r1"]), vec![]);
        let text = Panel::default().view(&state).to_string();
        assert!(text.starts_with("Currently Playing"));
        assert!(text.contains("[Recently Played]"));
        assert!(text.contains(" Top Tracks "));
        assert!(text.contains("Now Playing"));
        assert!(text.contains("  > Song now - Artist (Album)"));
        assert!(text.contains("  1. Song r1 - Artist (Album)"));
    }

    #[test]
    fn view_serializes_with_status_tag() {
        let json = serde_json::to_value(Panel::default().view(&FeedState::default())).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["tab"], "recent");
        assert_eq!(json["heading"], "recently_played");
    }
}
