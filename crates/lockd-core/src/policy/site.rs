//! Governed site policies.
//!
//! Field names on the wire follow the extension's stored config
//! (`name`, `match`, `work`, `private`, `ration`), so configs written by
//! the options page deserialize unchanged.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How a policy's `domain` is compared against a hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchMode {
    /// Hostname equals the domain.
    #[serde(rename = "exact")]
    Exact,
    /// Hostname equals the domain or is one of its subdomains.
    #[default]
    #[serde(rename = "base", alias = "base-domain")]
    BaseDomain,
    /// Domain is a regular expression tested against the raw hostname.
    #[serde(rename = "regex")]
    Regex,
}

/// A policy's match rule with the value it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule<'a> {
    Exact(&'a str),
    BaseDomain(&'a str),
    Regex(&'a str),
}

/// Policy for one governed domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePolicy {
    /// Canonical match key (a literal domain, or a pattern in regex mode).
    pub domain: String,
    #[serde(rename = "name", alias = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "match", alias = "matchMode", default)]
    pub match_mode: MatchMode,
    #[serde(rename = "work", alias = "allowWork", default)]
    pub allow_work: bool,
    #[serde(rename = "private", alias = "allowPrivate", default)]
    pub allow_private: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(rename = "ration", alias = "rationed", default)]
    pub rationed: bool,
    #[serde(default = "default_ration_minutes")]
    pub ration_minutes: u32,
    #[serde(default)]
    pub ask_feelings_after_overtime: bool,
}

fn default_ration_minutes() -> u32 {
    5
}

impl SitePolicy {
    /// Pass-mode policy allowing both work and private access.
    pub fn new(domain: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            display_name: display_name.into(),
            match_mode: MatchMode::BaseDomain,
            allow_work: true,
            allow_private: true,
            blocked: false,
            rationed: false,
            ration_minutes: default_ration_minutes(),
            ask_feelings_after_overtime: false,
        }
    }

    pub fn with_match(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn with_ration(mut self, minutes: u32) -> Self {
        self.rationed = true;
        self.ration_minutes = minutes;
        self
    }

    pub fn with_blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    pub fn with_feelings_prompt(mut self, ask: bool) -> Self {
        self.ask_feelings_after_overtime = ask;
        self
    }

    pub fn rule(&self) -> MatchRule<'_> {
        match self.match_mode {
            MatchMode::Exact => MatchRule::Exact(&self.domain),
            MatchMode::BaseDomain => MatchRule::BaseDomain(&self.domain),
            MatchMode::Regex => MatchRule::Regex(&self.domain),
        }
    }

    /// Daily base budget. A zero `ration_minutes` is treated as one minute.
    pub fn budget_seconds(&self) -> u64 {
        u64::from(self.ration_minutes.max(1)) * 60
    }

    /// Name to show in prompts, falling back to the domain.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.domain
        } else {
            &self.display_name
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.domain.trim().is_empty() {
            return Err(ValidationError::EmptyDomain);
        }
        if self.rationed && self.ration_minutes == 0 {
            return Err(ValidationError::InvalidDuration {
                field: format!("{}.rationMinutes", self.domain),
                minutes: 0,
            });
        }
        Ok(())
    }
}
