mod day;
mod ledger;

pub use day::{DayBoundary, DayChange, MIDNIGHT_ALARM};
pub use ledger::{OvertimeGrant, RationLedger, RationStatus, RationUsageRecord};
