//! Navigation-time access decisions.
//!
//! Rules are evaluated in order and the first one that applies wins:
//!
//! ```text
//! ungoverned -> blocked -> pass -> ration -> choose
//! ```
//!
//! `blocked` is checked before passes so a hard block can never be bought
//! out, and passes are checked before the ration so a pass bypasses an
//! exhausted daily budget.

use serde::{Deserialize, Serialize};

use super::site::SitePolicy;
use crate::ration::RationStatus;

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum Decision {
    /// Page may load. `tracked` is set when the visit spends ration time.
    Allow { tracked: bool },
    Blocked,
    ChooseAccess,
    RationExpired,
}

/// Everything the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub enabled: bool,
    pub policy: Option<&'a SitePolicy>,
    pub has_pass: bool,
    /// Present when the policy is rationed.
    pub ration: Option<&'a RationStatus>,
}

type Rule = fn(&DecisionInput<'_>) -> Option<Decision>;

const RULES: [(&str, Rule); 5] = [
    ("ungoverned", ungoverned),
    ("blocked", blocked),
    ("pass", pass),
    ("ration", ration),
    ("choose", choose),
];

/// Evaluate the rules in order. Returns the decision and the rule that made it.
pub fn decide(input: &DecisionInput<'_>) -> (Decision, &'static str) {
    RULES
        .iter()
        .find_map(|(name, rule)| rule(input).map(|decision| (decision, *name)))
        .unwrap_or((Decision::Allow { tracked: false }, "fallthrough"))
}

fn ungoverned(input: &DecisionInput<'_>) -> Option<Decision> {
    (!input.enabled || input.policy.is_none()).then_some(Decision::Allow { tracked: false })
}

fn blocked(input: &DecisionInput<'_>) -> Option<Decision> {
    input
        .policy
        .filter(|p| p.blocked)
        .map(|_| Decision::Blocked)
}

fn pass(input: &DecisionInput<'_>) -> Option<Decision> {
    input.has_pass.then_some(Decision::Allow { tracked: false })
}

fn ration(input: &DecisionInput<'_>) -> Option<Decision> {
    let policy = input.policy?;
    if !policy.rationed {
        return None;
    }
    // A rationed site without a computed status fails open.
    match input.ration {
        Some(status) if status.is_exhausted => Some(Decision::RationExpired),
        _ => Some(Decision::Allow { tracked: true }),
    }
}

fn choose(input: &DecisionInput<'_>) -> Option<Decision> {
    input.policy.map(|_| Decision::ChooseAccess)
}
