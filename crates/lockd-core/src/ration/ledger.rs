//! Daily ration accounting.
//!
//! Usage is counted in whole seconds per domain per local calendar day.
//! Overtime widens the current day's budget and is cleared at midnight.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::policy::SitePolicy;

/// Today's usage for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RationUsageRecord {
    pub date: NaiveDate,
    pub used_seconds: u64,
}

/// Extra minutes granted for one domain on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeGrant {
    pub date: NaiveDate,
    pub granted_minutes: u32,
}

/// Point-in-time view of a domain's ration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RationStatus {
    pub used_seconds: u64,
    pub budget_seconds: u64,
    pub overtime_seconds: u64,
    pub total_budget_seconds: u64,
    pub remaining_seconds: u64,
    pub is_exhausted: bool,
}

impl RationStatus {
    fn compute(used_seconds: u64, budget_seconds: u64, overtime_seconds: u64) -> Self {
        let total_budget_seconds = budget_seconds + overtime_seconds;
        Self {
            used_seconds,
            budget_seconds,
            overtime_seconds,
            total_budget_seconds,
            remaining_seconds: total_budget_seconds.saturating_sub(used_seconds),
            is_exhausted: used_seconds >= total_budget_seconds,
        }
    }
}

#[derive(Debug, Default)]
pub struct RationLedger {
    usage: BTreeMap<String, RationUsageRecord>,
    overtime: BTreeMap<String, OvertimeGrant>,
    exhausted: HashSet<String>,
    usage_dirty: bool,
    overtime_dirty: bool,
}

impl RationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(
        usage: BTreeMap<String, RationUsageRecord>,
        overtime: BTreeMap<String, OvertimeGrant>,
    ) -> Self {
        Self {
            usage,
            overtime,
            ..Self::default()
        }
    }

    pub fn used_seconds(&self, domain: &str, today: NaiveDate) -> u64 {
        self.usage
            .get(domain)
            .filter(|record| record.date == today)
            .map(|record| record.used_seconds)
            .unwrap_or(0)
    }

    pub fn overtime_minutes(&self, domain: &str, today: NaiveDate) -> u32 {
        self.overtime
            .get(domain)
            .filter(|grant| grant.date == today)
            .map(|grant| grant.granted_minutes)
            .unwrap_or(0)
    }

    /// Today's overtime for every domain that has some.
    pub fn overtime_today(&self, today: NaiveDate) -> BTreeMap<String, u32> {
        self.overtime
            .iter()
            .filter(|(_, grant)| grant.date == today)
            .map(|(domain, grant)| (domain.clone(), grant.granted_minutes))
            .collect()
    }

    pub fn status(&self, domain: &str, policy: &SitePolicy, today: NaiveDate) -> RationStatus {
        RationStatus::compute(
            self.used_seconds(domain, today),
            policy.budget_seconds(),
            u64::from(self.overtime_minutes(domain, today)) * 60,
        )
    }

    /// Add usage, starting a fresh record when the stored one is from
    /// another day. Returns today's total.
    pub fn increment_usage(&mut self, domain: &str, seconds: u64, today: NaiveDate) -> u64 {
        let record = self
            .usage
            .entry(domain.to_string())
            .or_insert_with(|| RationUsageRecord {
                date: today,
                used_seconds: 0,
            });
        if record.date != today {
            record.date = today;
            record.used_seconds = 0;
        }
        record.used_seconds = record.used_seconds.saturating_add(seconds);
        self.usage_dirty = true;
        record.used_seconds
    }

    /// Add overtime for today and release the exhaustion latch.
    /// Returns today's accumulated overtime minutes.
    pub fn grant_overtime(
        &mut self,
        domain: &str,
        minutes: u32,
        today: NaiveDate,
    ) -> Result<u32, ValidationError> {
        if minutes == 0 {
            return Err(ValidationError::InvalidDuration {
                field: "minutes".into(),
                minutes,
            });
        }
        let grant = self
            .overtime
            .entry(domain.to_string())
            .or_insert_with(|| OvertimeGrant {
                date: today,
                granted_minutes: 0,
            });
        if grant.date != today {
            grant.date = today;
            grant.granted_minutes = 0;
        }
        grant.granted_minutes = grant.granted_minutes.saturating_add(minutes);
        self.overtime_dirty = true;
        self.exhausted.remove(domain);
        Ok(grant.granted_minutes)
    }

    /// Zero every domain's usage for `today` and drop all overtime and latches.
    pub fn reset_for_new_day(&mut self, today: NaiveDate) {
        for record in self.usage.values_mut() {
            record.date = today;
            record.used_seconds = 0;
        }
        self.overtime.clear();
        self.exhausted.clear();
        self.usage_dirty = true;
        self.overtime_dirty = true;
    }

    pub fn is_latched(&self, domain: &str) -> bool {
        self.exhausted.contains(domain)
    }

    /// Returns `true` if the latch was newly set.
    pub fn latch_exhaustion(&mut self, domain: &str) -> bool {
        self.exhausted.insert(domain.to_string())
    }

    pub fn usage(&self) -> &BTreeMap<String, RationUsageRecord> {
        &self.usage
    }

    pub fn overtime(&self) -> &BTreeMap<String, OvertimeGrant> {
        &self.overtime
    }

    pub fn is_usage_dirty(&self) -> bool {
        self.usage_dirty
    }

    pub fn is_overtime_dirty(&self) -> bool {
        self.overtime_dirty
    }

    pub fn mark_usage_clean(&mut self) {
        self.usage_dirty = false;
    }

    pub fn mark_overtime_clean(&mut self) {
        self.overtime_dirty = false;
    }
}
