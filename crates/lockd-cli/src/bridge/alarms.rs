//! Named one-shot alarms on tokio timers.
//!
//! Each schedule bumps a generation counter. A firing carries the generation
//! it was armed with, and [`AlarmScheduler::take_fired`] rejects it when the
//! alarm has since been cleared or re-armed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

pub type Fired = (String, u64);

pub struct AlarmScheduler {
    tx: UnboundedSender<Fired>,
    timers: HashMap<String, (u64, JoinHandle<()>)>,
    generation: u64,
}

impl AlarmScheduler {
    pub fn new() -> (Self, UnboundedReceiver<Fired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                timers: HashMap::new(),
                generation: 0,
            },
            rx,
        )
    }

    /// Arm `name` for `at`, replacing any earlier timer with that name.
    pub fn schedule(&mut self, name: &str, at: DateTime<Utc>) {
        self.clear(name);
        self.generation += 1;
        let generation = self.generation;
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let tx = self.tx.clone();
        let fired_name = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((fired_name, generation));
        });
        debug!(alarm = name, delay_ms = delay.as_millis() as u64, "alarm armed");
        self.timers.insert(name.to_string(), (generation, handle));
    }

    pub fn clear(&mut self, name: &str) {
        if let Some((_, handle)) = self.timers.remove(name) {
            handle.abort();
        }
    }

    pub fn clear_all(&mut self) {
        for (_, (_, handle)) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Accept a firing if it is still the current timer for its name.
    pub fn take_fired(&mut self, name: &str, generation: u64) -> bool {
        match self.timers.get(name) {
            Some((current, _)) if *current == generation => {
                self.timers.remove(name);
                true
            }
            _ => {
                debug!(alarm = name, generation, "stale alarm firing ignored");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_alarm_fires() {
        let (mut alarms, mut rx) = AlarmScheduler::new();
        alarms.schedule("pass-reddit.com", Utc::now() + Duration::milliseconds(20));
        let (name, generation) = rx.recv().await.unwrap();
        assert_eq!(name, "pass-reddit.com");
        assert!(alarms.take_fired(&name, generation));
        assert_eq!(alarms.len(), 0);
    }

    #[tokio::test]
    async fn test_past_deadline_fires_immediately() {
        let (mut alarms, mut rx) = AlarmScheduler::new();
        alarms.schedule("midnight-reset", Utc::now() - Duration::seconds(5));
        let (name, generation) = rx.recv().await.unwrap();
        assert!(alarms.take_fired(&name, generation));
    }

    #[tokio::test]
    async fn test_rescheduled_generation_is_stale() {
        let (mut alarms, _rx) = AlarmScheduler::new();
        alarms.schedule("pass-x.com", Utc::now() + Duration::hours(1));
        let first = alarms.generation;
        alarms.schedule("pass-x.com", Utc::now() + Duration::hours(2));
        assert!(!alarms.take_fired("pass-x.com", first));
        assert!(alarms.take_fired("pass-x.com", alarms.generation));
    }

    #[tokio::test]
    async fn test_cleared_alarm_does_not_fire() {
        let (mut alarms, mut rx) = AlarmScheduler::new();
        alarms.schedule("pass-x.com", Utc::now() + Duration::milliseconds(20));
        alarms.clear("pass-x.com");
        alarms.schedule("pass-y.com", Utc::now() + Duration::milliseconds(60));
        let (name, _) = rx.recv().await.unwrap();
        assert_eq!(name, "pass-y.com");
    }
}
