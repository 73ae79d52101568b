//! Messages exchanged with the browser extension.
//!
//! Inbound frames are either host events (`{"event": "tabActivated", ...}`)
//! or requests (`{"id": 7, "action": "getAllPasses"}`). Outbound frames are
//! engine events (`{"type": "ShowOverlay", ...}`) and responses
//! (`{"id": 7, "response": ...}`).

use chrono::{DateTime, Local};
use lockd_core::{Event, GovernorEngine, Navigation, Request, Response, StateStore, TabId, TabInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Browser-side notifications forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostEvent {
    BeforeNavigate {
        tab_id: TabId,
        url: String,
        #[serde(default)]
        frame_id: i64,
    },
    TabActivated {
        tab_id: TabId,
        #[serde(default)]
        window_id: Option<i64>,
    },
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        window_id: Option<i64>,
        #[serde(default)]
        url: Option<String>,
    },
    TabRemoved {
        tab_id: TabId,
    },
    /// A negative id (`WINDOW_ID_NONE`) or null means the browser lost focus.
    WindowFocusChanged {
        #[serde(default)]
        window_id: Option<i64>,
    },
    Startup {
        #[serde(default)]
        tabs: Vec<TabInfo>,
        #[serde(default)]
        active_tab: Option<TabInfo>,
    },
    Shutdown,
}

impl HostEvent {
    pub fn dispatch<S: StateStore>(
        self,
        engine: &mut GovernorEngine<S>,
        now: DateTime<Local>,
    ) -> Vec<Event> {
        match self {
            HostEvent::BeforeNavigate {
                tab_id,
                url,
                frame_id,
            } => engine.on_navigate(
                Navigation {
                    tab_id,
                    url,
                    frame_id,
                },
                now,
            ),
            HostEvent::TabActivated { tab_id, window_id } => {
                engine.on_tab_activated(tab_id, window_id, now)
            }
            HostEvent::TabUpdated {
                tab_id,
                window_id,
                url,
            } => engine.on_tab_updated(
                TabInfo {
                    tab_id,
                    window_id,
                    url,
                },
                now,
            ),
            HostEvent::TabRemoved { tab_id } => engine.on_tab_removed(tab_id, now),
            HostEvent::WindowFocusChanged { window_id } => {
                engine.on_window_focus_changed(window_id.filter(|id| *id >= 0), now)
            }
            HostEvent::Startup { tabs, active_tab } => {
                // Pick up edits made through the CLI while the browser was closed.
                let mut events = match engine.load_from_storage(now) {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(error = %e, "reload on startup failed");
                        Vec::new()
                    }
                };
                events.extend(engine.on_startup(tabs, active_tab, now));
                events
            }
            HostEvent::Shutdown => Vec::new(),
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(HostEvent),
    Request { id: u64, request: Request },
    /// Undecodable frame. Answered with an error when it carried an id.
    Invalid { id: Option<u64>, error: String },
}

pub fn parse_inbound(bytes: &[u8]) -> Inbound {
    let mut value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            return Inbound::Invalid {
                id: None,
                error: e.to_string(),
            }
        }
    };

    if value.get("event").is_some() {
        return match serde_json::from_value(value) {
            Ok(event) => Inbound::Event(event),
            Err(e) => Inbound::Invalid {
                id: None,
                error: e.to_string(),
            },
        };
    }

    let id = value
        .as_object_mut()
        .and_then(|obj| obj.remove("id"))
        .and_then(|id| id.as_u64());
    let Some(id) = id else {
        return Inbound::Invalid {
            id: None,
            error: "request without a numeric id".into(),
        };
    };
    match serde_json::from_value(value) {
        Ok(request) => Inbound::Request { id, request },
        Err(e) => Inbound::Invalid {
            id: Some(id),
            error: e.to_string(),
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outbound<'a> {
    Event(&'a Event),
    Response { id: u64, response: &'a Response },
}
