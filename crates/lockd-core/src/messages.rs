//! Request/response contract used by the overlay and options pages.
//!
//! Requests are tagged by `action`. Responses are untagged so each one is
//! the bare JSON value the page expects (`{"success": true}`, a config
//! object, `null`, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsHistory;
use crate::feelings::{Feeling, FeelingEntry};
use crate::pass::{Pass, PassKind};
use crate::policy::SitePolicy;
use crate::ration::RationStatus;
use crate::storage::GovernorConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    GetConfig,
    SaveConfig {
        config: GovernorConfig,
    },
    GetSiteConfig {
        #[serde(alias = "domain")]
        hostname: String,
    },
    GrantPass {
        domain: String,
        #[serde(rename = "type")]
        kind: PassKind,
        #[serde(rename = "duration")]
        duration_minutes: u32,
    },
    GetPass {
        domain: String,
    },
    GetAllPasses,
    RevokePass {
        domain: String,
    },
    RevokeAllPasses,
    GrantOvertime {
        domain: String,
        minutes: u32,
    },
    GetOvertimeStatus {
        #[serde(default)]
        domain: Option<String>,
    },
    GetRationUsage {
        #[serde(default)]
        domain: Option<String>,
    },
    LogFeeling {
        domain: String,
        feeling: Feeling,
        duration_minutes: u32,
    },
    GetAnalytics,
    GetFeelings,
    GetVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Config(GovernorConfig),
    Site(Option<SitePolicy>),
    Pass(Option<Pass>),
    Passes(BTreeMap<String, Pass>),
    #[serde(rename_all = "camelCase")]
    Overtime {
        granted_minutes: u32,
    },
    OvertimeMap(BTreeMap<String, u32>),
    Ration(Option<RationStatus>),
    RationMap(BTreeMap<String, RationStatus>),
    Analytics(AnalyticsHistory),
    Feelings(Vec<FeelingEntry>),
    Version(String),
    Success {
        success: bool,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Success { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
