//! Which tab, if any, is spending ration time.
//!
//! The tracker keeps a registry of the tabs the host has told us about so
//! open tabs can be re-evaluated when a pass ends. Only one tab accrues
//! time: the active tab of the focused window.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type TabId = i64;
pub type WindowId = i64;

/// A tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub tab_id: TabId,
    #[serde(default)]
    pub window_id: Option<WindowId>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The tab currently accruing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTrackedTab {
    pub tab_id: TabId,
    pub domain: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum WindowFocus {
    /// No focus event seen yet; the last activated tab is assumed focused.
    #[default]
    Unknown,
    Window(WindowId),
    /// The browser lost focus.
    Unfocused,
}

#[derive(Debug, Default)]
pub struct ActiveTabTracker {
    tabs: HashMap<TabId, TabInfo>,
    active_by_window: HashMap<WindowId, TabId>,
    last_activated: Option<TabId>,
    focus: WindowFocus,
    tracked: Option<ActiveTrackedTab>,
}

impl ActiveTabTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a tab. Fields the host left out are kept.
    pub fn observe_tab(&mut self, info: TabInfo) {
        let entry = self.tabs.entry(info.tab_id).or_insert_with(|| TabInfo {
            tab_id: info.tab_id,
            window_id: None,
            url: None,
        });
        if info.window_id.is_some() {
            entry.window_id = info.window_id;
        }
        if info.url.is_some() {
            entry.url = info.url;
        }
    }

    pub fn set_url(&mut self, tab_id: TabId, url: &str) {
        self.observe_tab(TabInfo {
            tab_id,
            window_id: None,
            url: Some(url.to_string()),
        });
    }

    pub fn activate(&mut self, tab_id: TabId, window_id: Option<WindowId>) {
        self.observe_tab(TabInfo {
            tab_id,
            window_id,
            url: None,
        });
        let window = window_id.or_else(|| self.tabs.get(&tab_id).and_then(|t| t.window_id));
        if let Some(window) = window {
            self.active_by_window.insert(window, tab_id);
        }
        self.last_activated = Some(tab_id);
    }

    pub fn set_window_focus(&mut self, window_id: Option<WindowId>) {
        self.focus = match window_id {
            Some(id) => WindowFocus::Window(id),
            None => WindowFocus::Unfocused,
        };
    }

    /// Forget a tab. Returns `true` if it was the tracked tab.
    pub fn remove_tab(&mut self, tab_id: TabId) -> bool {
        self.tabs.remove(&tab_id);
        self.active_by_window.retain(|_, tab| *tab != tab_id);
        if self.last_activated == Some(tab_id) {
            self.last_activated = None;
        }
        let was_tracked = self.is_tracking(tab_id);
        if was_tracked {
            self.tracked = None;
        }
        was_tracked
    }

    /// The tab the user is looking at, if the browser has focus.
    pub fn candidate(&self) -> Option<&TabInfo> {
        let tab_id = match self.focus {
            WindowFocus::Unfocused => return None,
            WindowFocus::Window(window) => *self.active_by_window.get(&window)?,
            WindowFocus::Unknown => self.last_activated?,
        };
        self.tabs.get(&tab_id)
    }

    pub fn tab(&self, tab_id: TabId) -> Option<&TabInfo> {
        self.tabs.get(&tab_id)
    }

    pub fn tabs(&self) -> impl Iterator<Item = &TabInfo> {
        self.tabs.values()
    }

    pub fn tracked(&self) -> Option<&ActiveTrackedTab> {
        self.tracked.as_ref()
    }

    pub fn is_tracking(&self, tab_id: TabId) -> bool {
        self.tracked.as_ref().is_some_and(|t| t.tab_id == tab_id)
    }

    /// Replace the tracked tab. Returns `true` if it changed.
    pub fn set_tracked(&mut self, tracked: Option<ActiveTrackedTab>) -> bool {
        if self.tracked == tracked {
            return false;
        }
        self.tracked = tracked;
        true
    }

    pub fn clear_tracked(&mut self) -> Option<ActiveTrackedTab> {
        self.tracked.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(tab_id: TabId, window_id: WindowId, url: &str) -> TabInfo {
        TabInfo {
            tab_id,
            window_id: Some(window_id),
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn candidate_follows_focused_window() {
        let mut tracker = ActiveTabTracker::new();
        tracker.observe_tab(tab(1, 10, "https://reddit.com/"));
        tracker.observe_tab(tab(2, 20, "https://youtube.com/"));
        tracker.activate(1, Some(10));
        tracker.activate(2, Some(20));

        tracker.set_window_focus(Some(10));
        assert_eq!(tracker.candidate().map(|t| t.tab_id), Some(1));
        tracker.set_window_focus(Some(20));
        assert_eq!(tracker.candidate().map(|t| t.tab_id), Some(2));
    }

    #[test]
    fn unfocused_browser_has_no_candidate() {
        let mut tracker = ActiveTabTracker::new();
        tracker.observe_tab(tab(1, 10, "https://reddit.com/"));
        tracker.activate(1, Some(10));
        assert_eq!(tracker.candidate().map(|t| t.tab_id), Some(1));
        tracker.set_window_focus(None);
        assert!(tracker.candidate().is_none());
    }

    #[test]
    fn update_keeps_known_fields() {
        let mut tracker = ActiveTabTracker::new();
        tracker.observe_tab(tab(1, 10, "https://reddit.com/"));
        tracker.set_url(1, "https://reddit.com/r/rust");
        let info = tracker.tab(1).unwrap();
        assert_eq!(info.window_id, Some(10));
        assert_eq!(info.url.as_deref(), Some("https://reddit.com/r/rust"));
    }

    #[test]
    fn removing_tracked_tab_clears_tracking() {
        let mut tracker = ActiveTabTracker::new();
        tracker.observe_tab(tab(1, 10, "https://reddit.com/"));
        tracker.activate(1, Some(10));
        assert!(tracker.set_tracked(Some(ActiveTrackedTab {
            tab_id: 1,
            domain: "reddit.com".into(),
            url: "https://reddit.com/".into(),
        })));
        assert!(tracker.remove_tab(1));
        assert!(tracker.tracked().is_none());
        assert!(tracker.candidate().is_none());
        assert!(!tracker.remove_tab(1));
    }
}
