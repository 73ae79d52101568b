//! Self-reported feelings after a ration or pass ends.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entries kept in the persisted log.
pub const FEELINGS_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feeling {
    Positive,
    Neutral,
    Negative,
}

impl Feeling {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feeling::Positive => "positive",
            Feeling::Neutral => "neutral",
            Feeling::Negative => "negative",
        }
    }
}

impl std::str::FromStr for Feeling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Feeling::Positive),
            "neutral" => Ok(Feeling::Neutral),
            "negative" => Ok(Feeling::Negative),
            other => Err(format!("unknown feeling '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeelingEntry {
    pub domain: String,
    pub feeling: Feeling,
    pub duration_minutes: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
}

/// Newest-last log bounded at [`FEELINGS_LOG_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeelingsLog {
    entries: VecDeque<FeelingEntry>,
}

impl FeelingsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FeelingEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > FEELINGS_LOG_LIMIT {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &FeelingEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
