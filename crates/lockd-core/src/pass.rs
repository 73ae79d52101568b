//! Timed full-access passes.
//!
//! A pass lets the user onto a governed site for a fixed number of minutes
//! without spending ration time. There is at most one pass per domain; a
//! new grant replaces the old one. Expiry is driven by a named alarm
//! (`pass-<domain>`), but [`PassStore::is_active`] also checks the clock so
//! a missed alarm never extends access.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const ALARM_PREFIX: &str = "pass-";

/// Why the pass was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    Work,
    Private,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Work => "work",
            PassKind::Private => "private",
        }
    }
}

impl std::str::FromStr for PassKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(PassKind::Work),
            "private" => Ok(PassKind::Private),
            other => Err(ValidationError::InvalidValue {
                field: "type".into(),
                message: format!("unknown pass type '{other}'"),
            }),
        }
    }
}

/// A granted pass. Timestamps are epoch milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    #[serde(rename = "type")]
    pub kind: PassKind,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub granted_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Pass {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Alarm name for a domain's pass.
pub fn alarm_name(domain: &str) -> String {
    format!("{ALARM_PREFIX}{domain}")
}

/// Domain encoded in a pass alarm name, if it is one.
pub fn domain_from_alarm(name: &str) -> Option<&str> {
    name.strip_prefix(ALARM_PREFIX).filter(|d| !d.is_empty())
}

/// What an expiry alarm found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// The pass ran out and was removed.
    Expired,
    /// The pass was re-granted after the alarm was set; nothing removed.
    Superseded,
    /// No pass for that domain.
    Missing,
}

#[derive(Debug, Default)]
pub struct PassStore {
    passes: BTreeMap<String, Pass>,
    dirty: bool,
}

impl PassStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore persisted passes, dropping the ones already expired.
    pub fn from_persisted(passes: BTreeMap<String, Pass>, now: DateTime<Utc>) -> Self {
        let before = passes.len();
        let passes: BTreeMap<_, _> = passes.into_iter().filter(|(_, p)| p.is_active(now)).collect();
        let dirty = passes.len() != before;
        if dirty {
            tracing::debug!(dropped = before - passes.len(), "dropped expired passes on load");
        }
        Self { passes, dirty }
    }

    pub fn grant(
        &mut self,
        domain: &str,
        kind: PassKind,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<&Pass, ValidationError> {
        if domain.trim().is_empty() {
            return Err(ValidationError::EmptyDomain);
        }
        if minutes == 0 {
            return Err(ValidationError::InvalidDuration {
                field: "duration".into(),
                minutes,
            });
        }
        let pass = Pass {
            kind,
            granted_at: now,
            expires_at: now + Duration::minutes(i64::from(minutes)),
        };
        self.dirty = true;
        self.passes.insert(domain.to_string(), pass);
        Ok(&self.passes[domain])
    }

    /// `true` iff an unexpired pass exists. Expired entries are evicted.
    pub fn is_active(&mut self, domain: &str, now: DateTime<Utc>) -> bool {
        match self.passes.get(domain) {
            Some(pass) if pass.is_active(now) => true,
            Some(_) => {
                self.passes.remove(domain);
                self.dirty = true;
                false
            }
            None => false,
        }
    }

    /// Active pass for a domain, without evicting.
    pub fn get(&self, domain: &str, now: DateTime<Utc>) -> Option<&Pass> {
        self.passes.get(domain).filter(|p| p.is_active(now))
    }

    /// All active passes, evicting expired ones first.
    pub fn active(&mut self, now: DateTime<Utc>) -> &BTreeMap<String, Pass> {
        self.evict_expired(now);
        &self.passes
    }

    /// Returns the evicted domains.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .passes
            .iter()
            .filter(|(_, p)| !p.is_active(now))
            .map(|(d, _)| d.clone())
            .collect();
        for domain in &expired {
            self.passes.remove(domain);
        }
        if !expired.is_empty() {
            self.dirty = true;
        }
        expired
    }

    pub fn revoke(&mut self, domain: &str) -> Option<Pass> {
        let removed = self.passes.remove(domain);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn revoke_all(&mut self) -> Vec<String> {
        let domains: Vec<String> = self.passes.keys().cloned().collect();
        if !domains.is_empty() {
            self.passes.clear();
            self.dirty = true;
        }
        domains
    }

    /// Alarm callback. Only removes the pass if it is actually expired.
    pub fn expire(&mut self, domain: &str, now: DateTime<Utc>) -> ExpiryOutcome {
        match self.passes.get(domain) {
            None => ExpiryOutcome::Missing,
            Some(pass) if pass.is_active(now) => ExpiryOutcome::Superseded,
            Some(_) => {
                self.passes.remove(domain);
                self.dirty = true;
                ExpiryOutcome::Expired
            }
        }
    }

    /// Every stored pass, including ones not yet evicted.
    pub fn all(&self) -> &BTreeMap<String, Pass> {
        &self.passes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
