//! Local-midnight rollover.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};

/// Alarm name of the daily reset.
pub const MIDNIGHT_ALARM: &str = "midnight-reset";

/// Result of observing the current local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayChange {
    /// No date was known yet (fresh process).
    First(NaiveDate),
    Same,
    Rolled { from: NaiveDate, to: NaiveDate },
}

/// Remembers which local day the ledger was last reconciled for.
#[derive(Debug, Default)]
pub struct DayBoundary {
    current: Option<NaiveDate>,
}

impl DayBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never moves backwards: a clock stepping back keeps the later date.
    pub fn observe(&mut self, today: NaiveDate) -> DayChange {
        match self.current {
            None => {
                self.current = Some(today);
                DayChange::First(today)
            }
            Some(previous) if today <= previous => DayChange::Same,
            Some(previous) => {
                self.current = Some(today);
                DayChange::Rolled {
                    from: previous,
                    to: today,
                }
            }
        }
    }

    /// The day usage is charged to: the later of `now`'s date and the last
    /// observed one.
    pub fn ledger_day(&self, now: DateTime<Local>) -> NaiveDate {
        let date = now.date_naive();
        self.current.map_or(date, |current| current.max(date))
    }

    /// Instant of the next local midnight after `now`.
    pub fn next_midnight(now: DateTime<Local>) -> DateTime<Utc> {
        now.date_naive()
            .succ_opt()
            .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
            .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
            .map(|midnight| midnight.with_timezone(&Utc))
            .unwrap_or_else(|| (now + Duration::hours(24)).with_timezone(&Utc))
    }
}
