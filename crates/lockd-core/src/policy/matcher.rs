//! Hostname to policy resolution.
//!
//! Normalization rule: hostnames are lowercased and a trailing dot removed.
//! A leading `www.` is stripped for exact and base-domain matching only.
//! Regex policies see the hostname with `www.` intact, so the pattern alone
//! decides whether `www.` matters.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;
use url::Url;

use super::site::{MatchRule, SitePolicy};

/// Resolves hostnames against an ordered policy list.
///
/// Compiled regex patterns are cached by pattern text. Patterns that fail to
/// compile are cached as `None` and never match.
#[derive(Debug, Default)]
pub struct DomainMatcher {
    compiled: HashMap<String, Option<Regex>>,
}

impl DomainMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// First policy in configured order whose rule matches `hostname`.
    pub fn find<'a>(&mut self, hostname: &str, policies: &'a [SitePolicy]) -> Option<&'a SitePolicy> {
        let host = normalize_hostname(hostname);
        if host.is_empty() {
            return None;
        }
        policies.iter().find(|policy| self.matches_normalized(&host, policy))
    }

    pub fn matches(&mut self, hostname: &str, policy: &SitePolicy) -> bool {
        let host = normalize_hostname(hostname);
        !host.is_empty() && self.matches_normalized(&host, policy)
    }

    /// Drop every compiled pattern. Called whenever the config changes.
    pub fn invalidate(&mut self) {
        self.compiled.clear();
    }

    fn matches_normalized(&mut self, host: &str, policy: &SitePolicy) -> bool {
        match policy.rule() {
            MatchRule::Exact(domain) => strip_www(host) == strip_www(&normalize_hostname(domain)),
            MatchRule::BaseDomain(domain) => {
                let domain = normalize_hostname(domain);
                let domain = strip_www(&domain);
                !domain.is_empty() && is_same_or_subdomain(strip_www(host), domain)
            }
            MatchRule::Regex(pattern) => self
                .regex(pattern)
                .map(|re| re.is_match(host))
                .unwrap_or(false),
        }
    }

    fn regex(&mut self, pattern: &str) -> Option<&Regex> {
        self.compiled
            .entry(pattern.to_string())
            .or_insert_with(|| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern, error = %e, "invalid site pattern, treating as non-matching");
                    None
                }
            })
            .as_ref()
    }
}

/// `host == domain` or `host` ends with `".domain"`.
pub fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

pub fn normalize_hostname(hostname: &str) -> String {
    hostname.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Strip a leading `www.` unless that would leave a bare TLD (`www.com`).
pub fn strip_www(host: &str) -> &str {
    match host.strip_prefix("www.") {
        Some(rest) if rest.contains('.') => rest,
        _ => host,
    }
}

/// Hostname of an `http`/`https` URL. Other schemes are never governed.
pub fn hostname_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(normalize_hostname)
}

/// First path segment of a URL (`/r` for `https://reddit.com/r/rust`),
/// or `/` for the root. Used to bucket analytics.
pub fn path_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let first = parsed
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty());
    Some(match first {
        Some(segment) => format!("/{segment}"),
        None => "/".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::site::MatchMode;
    use proptest::prelude::*;

    fn base(domain: &str) -> SitePolicy {
        SitePolicy::new(domain, "")
    }

    #[test]
    fn base_domain_matches_subdomains() {
        let mut matcher = DomainMatcher::new();
        let policy = base("reddit.com");
        assert!(matcher.matches("reddit.com", &policy));
        assert!(matcher.matches("old.reddit.com", &policy));
        assert!(matcher.matches("www.reddit.com", &policy));
        assert!(matcher.matches("WWW.Reddit.COM.", &policy));
        assert!(!matcher.matches("notreddit.com", &policy));
        assert!(!matcher.matches("reddit.com.evil.net", &policy));
    }

    #[test]
    fn www_is_kept_when_it_is_the_registrable_label() {
        assert_eq!(strip_www("www.com"), "www.com");
        assert_eq!(strip_www("www.reddit.com"), "reddit.com");
        let mut matcher = DomainMatcher::new();
        assert!(matcher.matches("www.reddit.com", &base("www.reddit.com")));
        assert!(matcher.matches("www.com", &base("www.com")));
    }

    #[test]
    fn exact_ignores_www_but_not_other_subdomains() {
        let mut matcher = DomainMatcher::new();
        let policy = base("youtube.com").with_match(MatchMode::Exact);
        assert!(matcher.matches("youtube.com", &policy));
        assert!(matcher.matches("www.youtube.com", &policy));
        assert!(!matcher.matches("m.youtube.com", &policy));
    }

    #[test]
    fn regex_sees_raw_hostname() {
        let mut matcher = DomainMatcher::new();
        let anchored = base("^reddit\\.com$").with_match(MatchMode::Regex);
        assert!(matcher.matches("reddit.com", &anchored));
        // www. is not stripped for regex policies.
        assert!(!matcher.matches("www.reddit.com", &anchored));

        let www_aware = base("^(www\\.)?reddit\\.com$").with_match(MatchMode::Regex);
        assert!(matcher.matches("www.reddit.com", &www_aware));
    }

    #[test]
    fn invalid_regex_is_a_non_match() {
        let mut matcher = DomainMatcher::new();
        let broken = base("([unclosed").with_match(MatchMode::Regex);
        let fallback = base("unclosed.com");
        let policies = vec![broken, fallback];
        assert!(!matcher.matches("unclosed.com", &policies[0]));
        let found = matcher.find("unclosed.com", &policies).unwrap();
        assert_eq!(found.domain, "unclosed.com");
    }

    #[test]
    fn first_policy_in_order_wins() {
        let mut matcher = DomainMatcher::new();
        let policies = vec![
            base("old.reddit.com").with_blocked(true),
            base("reddit.com"),
        ];
        assert!(matcher.find("old.reddit.com", &policies).unwrap().blocked);
        assert!(!matcher.find("www.reddit.com", &policies).unwrap().blocked);
        assert!(matcher.find("example.com", &policies).is_none());
    }

    #[test]
    fn invalidate_recompiles_patterns() {
        let mut matcher = DomainMatcher::new();
        let policy = base("tiktok").with_match(MatchMode::Regex);
        assert!(matcher.matches("www.tiktok.com", &policy));
        matcher.invalidate();
        assert!(matcher.compiled.is_empty());
        assert!(matcher.matches("www.tiktok.com", &policy));
    }

    #[test]
    fn hostname_from_url_only_accepts_web_schemes() {
        assert_eq!(
            hostname_from_url("https://www.Reddit.com/r/rust").as_deref(),
            Some("www.reddit.com")
        );
        assert_eq!(hostname_from_url("chrome://extensions"), None);
        assert_eq!(hostname_from_url("file:///tmp/x.html"), None);
        assert_eq!(hostname_from_url("not a url"), None);
    }

    #[test]
    fn path_key_uses_first_segment() {
        assert_eq!(path_key("https://reddit.com/r/rust/comments").as_deref(), Some("/r"));
        assert_eq!(path_key("https://youtube.com/").as_deref(), Some("/"));
        assert_eq!(path_key("https://youtube.com").as_deref(), Some("/"));
    }

    proptest! {
        #[test]
        fn base_domain_matches_iff_same_or_suffix(
            domain in "[a-z]{1,8}\\.(com|net|tv)",
            prefix in "[a-z]{0,6}",
        ) {
            let mut matcher = DomainMatcher::new();
            let policy = base(&domain);

            let sub = format!("{prefix}.{domain}");
            let glued = format!("{prefix}{domain}");
            prop_assert!(matcher.matches(&domain, &policy));
            if !prefix.is_empty() {
                prop_assert!(matcher.matches(&sub, &policy));
                // Glued prefixes (notreddit.com) are unrelated domains.
                prop_assert!(!matcher.matches(&glued, &policy));
            }
        }
    }
}
