//! Site policies, hostname matching, and access decisions.

mod decision;
mod matcher;
mod site;

pub use decision::{decide, Decision, DecisionInput};
pub use matcher::{
    hostname_from_url, is_same_or_subdomain, normalize_hostname, path_key, strip_www,
    DomainMatcher,
};
pub use site::{MatchMode, MatchRule, SitePolicy};
