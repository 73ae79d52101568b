//! Commands and notifications the engine hands back to its host.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::pass::PassKind;
use crate::tracker::TabId;

/// Every outward effect of the engine is an Event.
/// The host applies overlay and alarm commands; the rest are notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Event {
    /// Cover a tab with an intervention screen.
    ShowOverlay {
        tab_id: TabId,
        domain: String,
        overlay: OverlayMode,
    },
    RemoveOverlay {
        tab_id: TabId,
    },
    /// Arm (or re-arm) a named one-shot alarm.
    ScheduleAlarm {
        name: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        at: DateTime<Utc>,
    },
    ClearAlarm {
        name: String,
    },
    PassGranted {
        domain: String,
        kind: PassKind,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        expires_at: DateTime<Utc>,
    },
    PassExpired {
        domain: String,
    },
    PassRevoked {
        domain: String,
    },
    OvertimeGranted {
        domain: String,
        granted_minutes: u32,
    },
    RationExhausted {
        domain: String,
        used_seconds: u64,
        total_budget_seconds: u64,
    },
    /// The tab accruing ration time changed.
    TrackingChanged {
        tab_id: Option<TabId>,
        domain: Option<String>,
    },
    DayRolledOver {
        date: NaiveDate,
    },
}

/// Which intervention screen to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum OverlayMode {
    Choose,
    Blocked,
    RationExpired,
    Feelings {
        #[serde(rename = "passDuration")]
        pass_duration: u32,
    },
}
