//! Governed-site configuration.
//!
//! Stored as JSON under the `config` key using the extension's field names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ValidationError};
use crate::policy::SitePolicy;

/// Top-level configuration: governed sites plus the prompt settings the
/// overlays read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GovernorConfig {
    pub sites: Vec<SitePolicy>,
    /// Master switch. When off every navigation is allowed.
    pub enabled: bool,
    /// Work pass length, minutes.
    pub work_duration: u32,
    /// Countdown before a private pass can be chosen, seconds.
    pub private_delay: u32,
    pub private_duration_min: u32,
    pub private_duration_max: u32,
    pub private_duration_default: u32,
    pub extra_time_min: u32,
    pub extra_time_max: u32,
    pub extra_time_default: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            sites: default_sites(),
            enabled: true,
            work_duration: 30,
            private_delay: 15,
            private_duration_min: 5,
            private_duration_max: 30,
            private_duration_default: 15,
            extra_time_min: 1,
            extra_time_max: 60,
            extra_time_default: 5,
        }
    }
}

/// Sites shipped on first run.
pub fn default_sites() -> Vec<SitePolicy> {
    let site = |domain: &str, name: &str, work: bool, private: bool| {
        let mut policy = SitePolicy::new(domain, name);
        policy.allow_work = work;
        policy.allow_private = private;
        policy
    };
    vec![
        site("discord.com", "Discord", true, true),
        site("facebook.com", "Facebook", false, true),
        site("instagram.com", "Instagram", false, true),
        site("linkedin.com", "LinkedIn", true, false),
        site("reddit.com", "Reddit", true, true),
        site("snapchat.com", "Snapchat", false, true),
        site("tiktok.com", "TikTok", false, true),
        site("twitch.tv", "Twitch", false, true),
        site("x.com", "X / Twitter", true, true),
        site("youtube.com", "YouTube", true, true),
    ]
}

impl GovernorConfig {
    /// Decode a stored config, migrating legacy fields.
    /// Returns the config and whether a migration happened.
    pub fn from_stored(mut raw: Value) -> Result<(Self, bool), ConfigError> {
        let mut migrated = false;
        if let Some(obj) = raw.as_object_mut() {
            if let Some(legacy) = obj.remove("privateDuration") {
                obj.entry("privateDurationMax").or_insert_with(|| legacy.clone());
                obj.entry("privateDurationDefault").or_insert(legacy);
                migrated = true;
            }
        }
        let config: Self =
            serde_json::from_value(raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Ok((config, migrated))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for site in &self.sites {
            site.validate()?;
        }
        if self.work_duration == 0 {
            return Err(ValidationError::InvalidDuration {
                field: "workDuration".into(),
                minutes: 0,
            });
        }
        check_range(
            "privateDuration",
            self.private_duration_min,
            self.private_duration_default,
            self.private_duration_max,
        )?;
        check_range(
            "extraTime",
            self.extra_time_min,
            self.extra_time_default,
            self.extra_time_max,
        )
    }

    pub fn site(&self, domain: &str) -> Option<&SitePolicy> {
        self.sites.iter().find(|s| s.domain == domain)
    }

    /// Replace the site with the same domain, or append.
    pub fn upsert_site(&mut self, site: SitePolicy) {
        match self.sites.iter_mut().find(|s| s.domain == site.domain) {
            Some(existing) => *existing = site,
            None => self.sites.push(site),
        }
    }

    /// Returns `true` if a site was removed.
    pub fn remove_site(&mut self, domain: &str) -> bool {
        let before = self.sites.len();
        self.sites.retain(|s| s.domain != domain);
        self.sites.len() != before
    }

    /// Get a value by dot-separated key (`enabled`, `sites.0.blocked`).
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match get_json_value_by_path(&json, key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The new config is validated but not saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        set_json_value_by_path(&mut json, key, value)?;
        let updated: Self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        *self = updated;
        Ok(())
    }
}

fn check_range(field: &str, min: u32, default: u32, max: u32) -> Result<(), ValidationError> {
    if min == 0 || min > max || default < min || default > max {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("need 1 <= min <= default <= max, got {min}/{default}/{max}"),
        });
    }
    Ok(())
}

fn child<'a>(node: &'a Value, part: &str) -> Option<&'a Value> {
    match node {
        Value::Array(items) => items.get(part.parse::<usize>().ok()?),
        other => other.get(part),
    }
}

fn child_mut<'a>(node: &'a mut Value, part: &str) -> Option<&'a mut Value> {
    match node {
        Value::Array(items) => items.get_mut(part.parse::<usize>().ok()?),
        other => other.get_mut(part),
    }
}

fn get_json_value_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return None;
    }

    let mut current = root;
    for part in key.split('.') {
        current = child(current, part)?;
    }
    Some(current)
}

fn set_json_value_by_path(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
    if key.is_empty() {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    let unknown = || ConfigError::UnknownKey(key.to_string());
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let mut current = root;
    for part in key.split('.') {
        current = child_mut(current, part).ok_or_else(unknown)?;
    }

    let new_value = match &*current {
        Value::Bool(_) => Value::Bool(
            value
                .parse::<bool>()
                .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
        ),
        Value::Number(_) => Value::Number(
            value
                .parse::<u64>()
                .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                .into(),
        ),
        Value::Object(_) | Value::Array(_) => {
            serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
        }
        _ => Value::String(value.into()),
    };
    *current = new_value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MatchMode;
    use serde_json::json;

    #[test]
    fn default_config_has_ten_pass_mode_sites() {
        let cfg = GovernorConfig::default();
        assert_eq!(cfg.sites.len(), 10);
        assert!(cfg.sites.iter().all(|s| !s.blocked && !s.rationed));
        assert!(cfg.validate().is_ok());
        let linkedin = cfg.site("linkedin.com").unwrap();
        assert!(linkedin.allow_work && !linkedin.allow_private);
    }

    #[test]
    fn legacy_private_duration_is_migrated() {
        let raw = json!({
            "sites": [{"domain": "reddit.com", "name": "Reddit", "work": true, "private": true}],
            "workDuration": 25,
            "privateDuration": 20
        });
        let (cfg, migrated) = GovernorConfig::from_stored(raw).unwrap();
        assert!(migrated);
        assert_eq!(cfg.private_duration_max, 20);
        assert_eq!(cfg.private_duration_default, 20);
        assert_eq!(cfg.work_duration, 25);
        assert_eq!(cfg.sites.len(), 1);
        let back = serde_json::to_value(&cfg).unwrap();
        assert!(back.get("privateDuration").is_none());
    }

    #[test]
    fn current_config_is_not_migrated() {
        let raw = serde_json::to_value(GovernorConfig::default()).unwrap();
        let (_, migrated) = GovernorConfig::from_stored(raw).unwrap();
        assert!(!migrated);
    }

    #[test]
    fn get_supports_dot_path_and_index_keys() {
        let cfg = GovernorConfig::default();
        assert_eq!(cfg.get("workDuration").as_deref(), Some("30"));
        assert_eq!(cfg.get("sites.0.domain").as_deref(), Some("discord.com"));
        assert_eq!(cfg.get("sites.0.match").as_deref(), Some("base"));
        assert!(cfg.get("sites.99.domain").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_site_fields() {
        let mut cfg = GovernorConfig::default();
        cfg.set("sites.4.ration", "true").unwrap();
        cfg.set("sites.4.rationMinutes", "10").unwrap();
        cfg.set("sites.4.match", "exact").unwrap();
        let reddit = &cfg.sites[4];
        assert!(reddit.rationed);
        assert_eq!(reddit.ration_minutes, 10);
        assert_eq!(reddit.match_mode, MatchMode::Exact);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_type() {
        let mut cfg = GovernorConfig::default();
        assert!(matches!(
            cfg.set("nonsense", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("enabled", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("extraTimeMin", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, GovernorConfig::default());
    }

    #[test]
    fn upsert_and_remove_sites() {
        let mut cfg = GovernorConfig::default();
        cfg.upsert_site(SitePolicy::new("reddit.com", "Reddit").with_blocked(true));
        assert_eq!(cfg.sites.len(), 10);
        assert!(cfg.site("reddit.com").unwrap().blocked);
        cfg.upsert_site(SitePolicy::new("news.ycombinator.com", "HN"));
        assert_eq!(cfg.sites.len(), 11);
        assert!(cfg.remove_site("news.ycombinator.com"));
        assert!(!cfg.remove_site("news.ycombinator.com"));
    }
}
