//! Per-day usage history for the dashboard.
//!
//! Only recording lives here. History is keyed by local date
//! (`YYYY-MM-DD`) then by policy domain.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::feelings::Feeling;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteDayStats {
    pub total_seconds: u64,
    /// Hour of day (0-23) to seconds.
    pub hours: BTreeMap<u8, u64>,
    /// First path segment (`/r`, `/watch`, `/`) to seconds.
    pub paths: BTreeMap<String, u64>,
    pub overtime_seconds: u64,
    pub feelings: Vec<Feeling>,
    pub blocks: u32,
}

pub type AnalyticsHistory = BTreeMap<String, BTreeMap<String, SiteDayStats>>;

#[derive(Debug, Default)]
pub struct AnalyticsRecorder {
    history: AnalyticsHistory,
    dirty: bool,
}

impl AnalyticsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(history: AnalyticsHistory) -> Self {
        Self {
            history,
            dirty: false,
        }
    }

    fn entry(&mut self, date: NaiveDate, domain: &str) -> &mut SiteDayStats {
        self.dirty = true;
        self.history
            .entry(date.format("%Y-%m-%d").to_string())
            .or_default()
            .entry(domain.to_string())
            .or_default()
    }

    /// Attribute one tracked second.
    pub fn record_second(
        &mut self,
        date: NaiveDate,
        domain: &str,
        hour: u8,
        path: Option<&str>,
        overtime: bool,
    ) {
        let stats = self.entry(date, domain);
        stats.total_seconds += 1;
        *stats.hours.entry(hour).or_default() += 1;
        if let Some(path) = path {
            *stats.paths.entry(path.to_string()).or_default() += 1;
        }
        if overtime {
            stats.overtime_seconds += 1;
        }
    }

    /// An overlay was shown on navigation.
    pub fn record_block(&mut self, date: NaiveDate, domain: &str) {
        self.entry(date, domain).blocks += 1;
    }

    pub fn record_feeling(&mut self, date: NaiveDate, domain: &str, feeling: Feeling) {
        self.entry(date, domain).feelings.push(feeling);
    }

    pub fn day(&self, date: NaiveDate) -> Option<&BTreeMap<String, SiteDayStats>> {
        self.history.get(&date.format("%Y-%m-%d").to_string())
    }

    pub fn history(&self) -> &AnalyticsHistory {
        &self.history
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
