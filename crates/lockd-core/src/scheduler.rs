//! Tick pacing and the re-entrancy guard.
//!
//! The host drives [`GovernorEngine::try_tick`](crate::GovernorEngine::try_tick)
//! once per [`TICK_INTERVAL`] and
//! [`GovernorEngine::flush`](crate::GovernorEngine::flush) once per
//! [`FLUSH_INTERVAL`]. A tick that starts while another is still running
//! (for example, blocked on storage) is skipped rather than queued, so a
//! slow store can never double-count a second.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Hands out at most one [`TickPermit`] at a time. Clones share the guard.
#[derive(Debug, Clone, Default)]
pub struct TickGate {
    busy: Arc<AtomicBool>,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another permit is alive.
    pub fn try_enter(&self) -> Option<TickPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the current tick. Released on drop.
#[derive(Debug)]
pub struct TickPermit {
    busy: Arc<AtomicBool>,
}

impl TickPermit {
    pub(crate) fn belongs_to(&self, gate: &TickGate) -> bool {
        Arc::ptr_eq(&self.busy, &gate.busy)
    }
}

impl Drop for TickPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TickOutcome {
    /// Another tick held the permit.
    Skipped,
    /// Nothing was being tracked.
    Idle,
    /// One second was charged.
    #[serde(rename_all = "camelCase")]
    Charged { domain: String, used_seconds: u64 },
    /// Tracking was dropped before charging (pass granted, policy changed).
    Cleared { domain: String },
    /// The charge exhausted the ration.
    #[serde(rename_all = "camelCase")]
    Exhausted { domain: String, used_seconds: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_permit_at_a_time() {
        let gate = TickGate::new();
        let permit = gate.try_enter().expect("first permit");
        assert!(gate.is_busy());
        assert!(gate.clone().try_enter().is_none());
        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_enter().is_some());
    }

    #[test]
    fn permit_knows_its_gate() {
        let gate = TickGate::new();
        let other = TickGate::new();
        let permit = gate.try_enter().unwrap();
        assert!(permit.belongs_to(&gate));
        assert!(permit.belongs_to(&gate.clone()));
        assert!(!permit.belongs_to(&other));
    }
}
