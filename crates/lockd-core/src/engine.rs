//! Governor engine.
//!
//! The engine owns every piece of governor state and is driven entirely by
//! the host: browser events, the 1-second tick, the flush interval, named
//! alarms and page requests. It never calls the host back. Every handler
//! returns the [`Event`]s the host should apply.
//!
//! ## Lifecycle
//!
//! ```text
//! new -> ensure_initialized (lazy, idempotent) -> ... -> teardown
//! ```
//!
//! Browser-event handlers are infallible. If state cannot be loaded they
//! log and let the page through. Ticks, alarms and flushes return `Result`
//! so the host can log storage failures.
//!
//! ## Usage
//!
//! ```ignore
//! let db = Database::open_at(&settings.database_path()?)?;
//! let mut engine = GovernorEngine::new(db);
//! let events = engine.on_navigate(nav, Local::now());
//! // Once per second:
//! let report = engine.try_tick(Local::now())?;
//! ```

use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsHistory, AnalyticsRecorder};
use crate::error::{CoreError, Result, StorageError};
use crate::events::{Event, OverlayMode};
use crate::feelings::{FeelingEntry, FeelingsLog};
use crate::messages::{Request, Response};
use crate::pass::{alarm_name, domain_from_alarm, ExpiryOutcome, PassStore};
use crate::policy::{
    decide, hostname_from_url, normalize_hostname, path_key, Decision, DecisionInput,
    DomainMatcher, SitePolicy,
};
use crate::ration::{DayBoundary, DayChange, RationLedger, RationStatus, MIDNIGHT_ALARM};
use crate::scheduler::{TickGate, TickOutcome, TickPermit};
use crate::storage::{keys, load_json, save_json, GovernorConfig, StateStore};
use crate::tracker::{ActiveTabTracker, ActiveTrackedTab, TabId, TabInfo, WindowId};

/// A before-navigate event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub tab_id: TabId,
    pub url: String,
    /// Only frame 0 (the top-level document) is governed.
    #[serde(default)]
    pub frame_id: i64,
}

/// Result of checking a hostname against the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheck {
    /// Domain of the matching policy.
    pub domain: Option<String>,
    pub decision: Decision,
    pub ration: Option<RationStatus>,
}

impl AccessCheck {
    fn ungoverned() -> Self {
        Self {
            domain: None,
            decision: Decision::Allow { tracked: false },
            ration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub events: Vec<Event>,
}

impl TickReport {
    fn new(outcome: TickOutcome, events: Vec<Event>) -> Self {
        Self { outcome, events }
    }
}

/// Overlay to show for a decision, if any.
pub fn overlay_for(decision: Decision) -> Option<OverlayMode> {
    match decision {
        Decision::Allow { .. } => None,
        Decision::Blocked => Some(OverlayMode::Blocked),
        Decision::ChooseAccess => Some(OverlayMode::Choose),
        Decision::RationExpired => Some(OverlayMode::RationExpired),
    }
}

pub struct GovernorEngine<S: StateStore> {
    store: S,
    config: GovernorConfig,
    matcher: DomainMatcher,
    passes: PassStore,
    ledger: RationLedger,
    day: DayBoundary,
    tracker: ActiveTabTracker,
    analytics: AnalyticsRecorder,
    feelings: FeelingsLog,
    gate: TickGate,
    initialized: bool,
}

impl<S: StateStore> GovernorEngine<S> {
    /// Create an engine over `store`. Nothing is read until first use.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: GovernorConfig::default(),
            matcher: DomainMatcher::new(),
            passes: PassStore::new(),
            ledger: RationLedger::new(),
            day: DayBoundary::new(),
            tracker: ActiveTabTracker::new(),
            analytics: AnalyticsRecorder::new(),
            feelings: FeelingsLog::new(),
            gate: TickGate::new(),
            initialized: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn tracked(&self) -> Option<&ActiveTrackedTab> {
        self.tracker.tracked()
    }

    pub fn is_exhaustion_latched(&self, domain: &str) -> bool {
        self.ledger.is_latched(domain)
    }

    /// Shared handle to the tick guard, for hosts that hold the permit
    /// across their own I/O.
    pub fn tick_gate(&self) -> TickGate {
        self.gate.clone()
    }

    pub fn analytics(&self) -> &AnalyticsHistory {
        self.analytics.history()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load state on first use. Later calls are no-ops returning no events.
    pub fn ensure_initialized(&mut self, now: DateTime<Local>) -> Result<Vec<Event>> {
        if self.initialized {
            return Ok(Vec::new());
        }
        self.load_from_storage(now)
    }

    /// Reload all durable state, replacing in-memory caches.
    ///
    /// Dirty counters are flushed first, so a reload never loses charged
    /// time. Returns the alarm schedule the host must arm.
    pub fn load_from_storage(&mut self, now: DateTime<Local>) -> Result<Vec<Event>> {
        if self.initialized {
            self.flush(now)?;
        }
        let utc = now.with_timezone(&Utc);

        let config = match load_json::<Value, _>(&self.store, keys::CONFIG)? {
            Some(raw) => {
                let (config, migrated) = GovernorConfig::from_stored(raw)?;
                if migrated {
                    info!("migrated legacy privateDuration setting");
                    save_json(&self.store, keys::CONFIG, &config)?;
                }
                config
            }
            None => {
                let config = GovernorConfig::default();
                save_json(&self.store, keys::CONFIG, &config)?;
                config
            }
        };

        let passes = PassStore::from_persisted(
            load_json(&self.store, keys::PASSES)?.unwrap_or_default(),
            utc,
        );
        let ledger = RationLedger::from_persisted(
            load_json(&self.store, keys::RATION_USAGE)?.unwrap_or_default(),
            load_json(&self.store, keys::RATION_OVERTIME)?.unwrap_or_default(),
        );
        let feelings: FeelingsLog = load_json(&self.store, keys::FEELINGS_LOG)?.unwrap_or_default();
        let analytics = AnalyticsRecorder::from_persisted(
            load_json(&self.store, keys::ANALYTICS_HISTORY)?.unwrap_or_default(),
        );

        self.config = config;
        self.matcher.invalidate();
        self.passes = passes;
        self.ledger = ledger;
        self.feelings = feelings;
        self.analytics = analytics;
        if !self.initialized {
            self.day = DayBoundary::new();
            self.day.observe(now.date_naive());
        }
        self.initialized = true;

        let mut events: Vec<Event> = self
            .passes
            .all()
            .iter()
            .map(|(domain, pass)| Event::ScheduleAlarm {
                name: alarm_name(domain),
                at: pass.expires_at,
            })
            .collect();
        events.push(Event::ScheduleAlarm {
            name: MIDNIGHT_ALARM.to_string(),
            at: DayBoundary::next_midnight(now),
        });

        info!(
            sites = self.config.sites.len(),
            passes = self.passes.all().len(),
            enabled = self.config.enabled,
            "governor state loaded"
        );

        self.refresh_tracking(now, &mut events);
        Ok(events)
    }

    /// Flush, stop tracking and cancel alarms. The next handler reloads.
    pub fn teardown(&mut self, now: DateTime<Local>) -> Result<Vec<Event>> {
        if !self.initialized {
            return Ok(Vec::new());
        }
        // On failure stay initialized so nothing reloads over the unsaved counters.
        self.flush(now)?;

        let mut events = Vec::new();
        if self.tracker.clear_tracked().is_some() {
            events.push(Event::TrackingChanged {
                tab_id: None,
                domain: None,
            });
        }
        events.extend(self.passes.all().keys().map(|domain| Event::ClearAlarm {
            name: alarm_name(domain),
        }));
        events.push(Event::ClearAlarm {
            name: MIDNIGHT_ALARM.to_string(),
        });
        self.initialized = false;
        info!("governor torn down");
        Ok(events)
    }

    /// Like [`ensure_initialized`](Self::ensure_initialized), but logs and
    /// returns `None` on failure so callers can fail open.
    fn ensure_ready(&mut self, now: DateTime<Local>) -> Option<Vec<Event>> {
        match self.ensure_initialized(now) {
            Ok(events) => Some(events),
            Err(e) => {
                warn!(error = %e, "failed to load governor state; allowing navigation");
                None
            }
        }
    }

    // ── Browser events ───────────────────────────────────────────────

    pub fn on_navigate(&mut self, nav: Navigation, now: DateTime<Local>) -> Vec<Event> {
        if nav.frame_id != 0 {
            return Vec::new();
        }
        let Some(mut events) = self.ensure_ready(now) else {
            return Vec::new();
        };

        self.tracker.set_url(nav.tab_id, &nav.url);
        if let Some(host) = hostname_from_url(&nav.url) {
            let check = self.evaluate(&host, now);
            if let (Some(domain), Some(overlay)) = (check.domain, overlay_for(check.decision)) {
                self.analytics.record_block(self.day.ledger_day(now), &domain);
                if self.tracker.is_tracking(nav.tab_id) {
                    self.tracker.clear_tracked();
                    events.push(Event::TrackingChanged {
                        tab_id: None,
                        domain: None,
                    });
                }
                events.push(Event::ShowOverlay {
                    tab_id: nav.tab_id,
                    domain,
                    overlay,
                });
            }
        }

        self.refresh_tracking(now, &mut events);
        events
    }

    pub fn on_tab_activated(
        &mut self,
        tab_id: TabId,
        window_id: Option<WindowId>,
        now: DateTime<Local>,
    ) -> Vec<Event> {
        let Some(mut events) = self.ensure_ready(now) else {
            return Vec::new();
        };
        self.tracker.activate(tab_id, window_id);
        self.refresh_tracking(now, &mut events);
        events
    }

    pub fn on_tab_updated(&mut self, tab: TabInfo, now: DateTime<Local>) -> Vec<Event> {
        let Some(mut events) = self.ensure_ready(now) else {
            return Vec::new();
        };
        self.tracker.observe_tab(tab);
        self.refresh_tracking(now, &mut events);
        events
    }

    pub fn on_tab_removed(&mut self, tab_id: TabId, now: DateTime<Local>) -> Vec<Event> {
        let Some(mut events) = self.ensure_ready(now) else {
            return Vec::new();
        };
        if self.tracker.remove_tab(tab_id) {
            events.push(Event::TrackingChanged {
                tab_id: None,
                domain: None,
            });
        }
        self.refresh_tracking(now, &mut events);
        events
    }

    /// `None` means the browser lost focus; tracking pauses.
    pub fn on_window_focus_changed(
        &mut self,
        window_id: Option<WindowId>,
        now: DateTime<Local>,
    ) -> Vec<Event> {
        let Some(mut events) = self.ensure_ready(now) else {
            return Vec::new();
        };
        self.tracker.set_window_focus(window_id);
        self.refresh_tracking(now, &mut events);
        events
    }

    /// Seed the tab registry with the tabs open when the host started.
    pub fn on_startup(
        &mut self,
        tabs: Vec<TabInfo>,
        active: Option<TabInfo>,
        now: DateTime<Local>,
    ) -> Vec<Event> {
        let Some(mut events) = self.ensure_ready(now) else {
            return Vec::new();
        };
        for tab in tabs {
            self.tracker.observe_tab(tab);
        }
        if let Some(active) = active {
            let (tab_id, window_id) = (active.tab_id, active.window_id);
            self.tracker.observe_tab(active);
            self.tracker.activate(tab_id, window_id);
            if window_id.is_some() {
                self.tracker.set_window_focus(window_id);
            }
        }
        self.refresh_tracking(now, &mut events);
        events
    }

    /// Decision for a hostname without side effects beyond lazy pass eviction.
    pub fn check_access(&mut self, hostname: &str, now: DateTime<Local>) -> AccessCheck {
        if self.ensure_ready(now).is_none() {
            return AccessCheck::ungoverned();
        }
        self.evaluate(hostname, now)
    }

    // ── Ticks and persistence ────────────────────────────────────────

    /// Charge one second to the tracked tab, unless another tick is running.
    pub fn try_tick(&mut self, now: DateTime<Local>) -> Result<TickReport> {
        let gate = self.gate.clone();
        let Some(permit) = gate.try_enter() else {
            debug!("tick skipped: previous tick still running");
            return Ok(TickReport::new(TickOutcome::Skipped, Vec::new()));
        };
        self.tick_with(&permit, now)
    }

    /// Run a tick under a permit the caller already holds.
    pub fn tick_with(&mut self, permit: &TickPermit, now: DateTime<Local>) -> Result<TickReport> {
        if !permit.belongs_to(&self.gate) {
            return Err(CoreError::Custom(
                "tick permit was issued by another engine".into(),
            ));
        }
        let mut events = self.ensure_initialized(now)?;
        self.roll_day(now, &mut events)?;

        let Some(tracked) = self.tracker.tracked().cloned() else {
            return Ok(TickReport::new(TickOutcome::Idle, events));
        };

        let Some(policy) = self.tracked_policy(&tracked, now) else {
            debug!(domain = %tracked.domain, "tracked tab no longer chargeable");
            self.tracker.clear_tracked();
            events.push(Event::TrackingChanged {
                tab_id: None,
                domain: None,
            });
            return Ok(TickReport::new(
                TickOutcome::Cleared {
                    domain: tracked.domain,
                },
                events,
            ));
        };

        let today = self.day.ledger_day(now);
        let domain = policy.domain.as_str();
        let used = self.ledger.increment_usage(domain, 1, today);
        self.analytics.record_second(
            today,
            domain,
            now.hour() as u8,
            path_key(&tracked.url).as_deref(),
            used > policy.budget_seconds(),
        );

        let status = self.ledger.status(domain, &policy, today);
        if !status.is_exhausted || self.ledger.is_latched(domain) {
            return Ok(TickReport::new(
                TickOutcome::Charged {
                    domain: domain.to_string(),
                    used_seconds: used,
                },
                events,
            ));
        }

        // Exhaustion must survive a crash; don't wait for the flush.
        if let Err(e) = self.persist_usage() {
            warn!(error = %e, domain, "failed to persist usage on exhaustion");
        }
        self.ledger.latch_exhaustion(domain);
        self.tracker.clear_tracked();
        info!(domain, used_seconds = used, "ration exhausted");

        let overlay = if policy.ask_feelings_after_overtime {
            OverlayMode::Feelings {
                pass_duration: (status.used_seconds / 60) as u32,
            }
        } else {
            OverlayMode::RationExpired
        };
        events.push(Event::TrackingChanged {
            tab_id: None,
            domain: None,
        });
        events.push(Event::RationExhausted {
            domain: domain.to_string(),
            used_seconds: status.used_seconds,
            total_budget_seconds: status.total_budget_seconds,
        });
        events.push(Event::ShowOverlay {
            tab_id: tracked.tab_id,
            domain: domain.to_string(),
            overlay,
        });

        Ok(TickReport::new(
            TickOutcome::Exhausted {
                domain: domain.to_string(),
                used_seconds: used,
            },
            events,
        ))
    }

    /// Write every dirty document. A no-op before initialization.
    pub fn flush(&mut self, _now: DateTime<Local>) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let mut written = Vec::new();
        if self.ledger.is_usage_dirty() {
            self.persist_usage()?;
            written.push(keys::RATION_USAGE);
        }
        if self.ledger.is_overtime_dirty() {
            self.persist_overtime()?;
            written.push(keys::RATION_OVERTIME);
        }
        if self.passes.is_dirty() {
            self.persist_passes()?;
            written.push(keys::PASSES);
        }
        if self.analytics.is_dirty() {
            save_json(&self.store, keys::ANALYTICS_HISTORY, self.analytics.history())?;
            self.analytics.mark_clean();
            written.push(keys::ANALYTICS_HISTORY);
        }
        if !written.is_empty() {
            debug!(keys = ?written, "flushed state");
        }
        Ok(())
    }

    // ── Alarms ───────────────────────────────────────────────────────

    pub fn on_alarm(&mut self, name: &str, now: DateTime<Local>) -> Result<Vec<Event>> {
        let mut events = self.ensure_initialized(now)?;

        if name == MIDNIGHT_ALARM {
            if !self.roll_day(now, &mut events)? {
                debug!("midnight alarm fired on the same day; rescheduling");
                events.push(Event::ScheduleAlarm {
                    name: MIDNIGHT_ALARM.to_string(),
                    at: DayBoundary::next_midnight(now),
                });
            }
            return Ok(events);
        }

        let Some(domain) = domain_from_alarm(name).map(str::to_string) else {
            warn!(alarm = name, "ignoring unknown alarm");
            return Ok(events);
        };

        match self.passes.expire(&domain, now.with_timezone(&Utc)) {
            ExpiryOutcome::Expired => {
                self.persist_passes()?;
                info!(domain = %domain, "pass expired");
                events.push(Event::PassExpired {
                    domain: domain.clone(),
                });
                self.reevaluate_domain(&domain, now, &mut events);
                self.refresh_tracking(now, &mut events);
            }
            ExpiryOutcome::Superseded => {
                debug!(domain = %domain, "stale pass alarm ignored");
            }
            ExpiryOutcome::Missing => {
                debug!(domain = %domain, "alarm for a pass that no longer exists");
            }
        }
        Ok(events)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Answer a page request. Failures become `{"error": ...}`.
    pub fn handle_request(
        &mut self,
        request: Request,
        now: DateTime<Local>,
    ) -> (Response, Vec<Event>) {
        match self.dispatch(request, now) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "request failed");
                (Response::error(e.to_string()), Vec::new())
            }
        }
    }

    fn dispatch(&mut self, request: Request, now: DateTime<Local>) -> Result<(Response, Vec<Event>)> {
        let mut events = self.ensure_initialized(now)?;
        let utc = now.with_timezone(&Utc);
        let today = self.day.ledger_day(now);

        let response = match request {
            Request::GetConfig => Response::Config(self.config.clone()),
            Request::SaveConfig { config } => {
                config.validate()?;
                save_json(&self.store, keys::CONFIG, &config)?;
                self.config = config;
                self.matcher.invalidate();
                info!(sites = self.config.sites.len(), "config saved");
                self.refresh_tracking(now, &mut events);
                Response::ok()
            }
            Request::GetSiteConfig { hostname } => {
                let host = normalize_hostname(&hostname);
                Response::Site(self.matcher.find(&host, &self.config.sites).cloned())
            }
            Request::GrantPass {
                domain,
                kind,
                duration_minutes,
            } => {
                let domain = self.policy_key(&domain);
                let pass = self.passes.grant(&domain, kind, duration_minutes, utc)?.clone();
                self.persist_passes()?;
                info!(domain = %domain, kind = kind.as_str(), minutes = duration_minutes, "pass granted");
                events.push(Event::ScheduleAlarm {
                    name: alarm_name(&domain),
                    at: pass.expires_at,
                });
                events.push(Event::PassGranted {
                    domain: domain.clone(),
                    kind,
                    expires_at: pass.expires_at,
                });
                self.release_domain(&domain, &mut events);
                self.refresh_tracking(now, &mut events);
                Response::ok()
            }
            Request::GetPass { domain } => {
                let domain = self.policy_key(&domain);
                Response::Pass(self.passes.get(&domain, utc).cloned())
            }
            Request::GetAllPasses => Response::Passes(self.passes.active(utc).clone()),
            Request::RevokePass { domain } => {
                let domain = self.policy_key(&domain);
                if self.passes.revoke(&domain).is_some() {
                    self.persist_passes()?;
                    info!(domain = %domain, "pass revoked");
                    self.after_revoke(&[domain], now, &mut events);
                }
                Response::ok()
            }
            Request::RevokeAllPasses => {
                let domains = self.passes.revoke_all();
                if !domains.is_empty() {
                    self.persist_passes()?;
                    info!(count = domains.len(), "all passes revoked");
                    self.after_revoke(&domains, now, &mut events);
                }
                Response::ok()
            }
            Request::GrantOvertime { domain, minutes } => {
                let domain = self.policy_key(&domain);
                let granted = self.ledger.grant_overtime(&domain, minutes, today)?;
                self.persist_overtime()?;
                info!(domain = %domain, minutes, total = granted, "overtime granted");
                events.push(Event::OvertimeGranted {
                    domain: domain.clone(),
                    granted_minutes: granted,
                });
                self.release_domain(&domain, &mut events);
                self.refresh_tracking(now, &mut events);
                Response::ok()
            }
            Request::GetOvertimeStatus { domain } => match domain {
                Some(domain) => {
                    let domain = self.policy_key(&domain);
                    Response::Overtime {
                        granted_minutes: self.ledger.overtime_minutes(&domain, today),
                    }
                }
                None => Response::OvertimeMap(self.ledger.overtime_today(today)),
            },
            Request::GetRationUsage { domain } => match domain {
                Some(domain) => {
                    let host = normalize_hostname(&domain);
                    let status = self
                        .matcher
                        .find(&host, &self.config.sites)
                        .filter(|p| p.rationed)
                        .map(|p| self.ledger.status(&p.domain, p, today));
                    Response::Ration(status)
                }
                None => Response::RationMap(
                    self.config
                        .sites
                        .iter()
                        .filter(|p| p.rationed)
                        .map(|p| (p.domain.clone(), self.ledger.status(&p.domain, p, today)))
                        .collect(),
                ),
            },
            Request::LogFeeling {
                domain,
                feeling,
                duration_minutes,
            } => {
                let domain = self.policy_key(&domain);
                self.feelings.push(FeelingEntry {
                    domain: domain.clone(),
                    feeling,
                    duration_minutes,
                    at: utc,
                });
                self.analytics.record_feeling(today, &domain, feeling);
                save_json(&self.store, keys::FEELINGS_LOG, &self.feelings)?;
                debug!(domain = %domain, ?feeling, "feeling logged");
                Response::ok()
            }
            Request::GetAnalytics => Response::Analytics(self.analytics.history().clone()),
            Request::GetFeelings => Response::Feelings(self.feelings.entries().cloned().collect()),
            Request::GetVersion => Response::Version(env!("CARGO_PKG_VERSION").to_string()),
        };
        Ok((response, events))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn evaluate(&mut self, hostname: &str, now: DateTime<Local>) -> AccessCheck {
        let host = normalize_hostname(hostname);
        let Some(policy) = self.matcher.find(&host, &self.config.sites) else {
            return AccessCheck::ungoverned();
        };
        let has_pass = self.passes.is_active(&policy.domain, now.with_timezone(&Utc));
        let ration = policy
            .rationed
            .then(|| self.ledger.status(&policy.domain, policy, self.day.ledger_day(now)));
        let (decision, rule) = decide(&DecisionInput {
            enabled: self.config.enabled,
            policy: Some(policy),
            has_pass,
            ration: ration.as_ref(),
        });
        debug!(host = %host, domain = %policy.domain, rule, ?decision, "access decision");
        AccessCheck {
            domain: Some(policy.domain.clone()),
            decision,
            ration,
        }
    }

    /// Policy domain for a hostname, or the normalized input if ungoverned.
    fn policy_key(&mut self, domain: &str) -> String {
        let host = normalize_hostname(domain);
        match self.matcher.find(&host, &self.config.sites) {
            Some(policy) => policy.domain.clone(),
            None => host,
        }
    }

    /// The policy to charge for the tracked tab, if it is still chargeable.
    fn tracked_policy(
        &mut self,
        tracked: &ActiveTrackedTab,
        now: DateTime<Local>,
    ) -> Option<SitePolicy> {
        if !self.config.enabled {
            return None;
        }
        let host = hostname_from_url(&tracked.url)?;
        let policy = self.matcher.find(&host, &self.config.sites)?;
        if !policy.rationed || policy.blocked || policy.domain != tracked.domain {
            return None;
        }
        if self.passes.is_active(&policy.domain, now.with_timezone(&Utc)) {
            return None;
        }
        Some(policy.clone())
    }

    /// Tracking entry for a tab, if the tab should accrue time.
    fn trackable(&mut self, tab_id: TabId, url: &str, now: DateTime<Local>) -> Option<ActiveTrackedTab> {
        if !self.config.enabled {
            return None;
        }
        let host = hostname_from_url(url)?;
        let policy = self.matcher.find(&host, &self.config.sites)?;
        if !policy.rationed || policy.blocked {
            return None;
        }
        if self.passes.is_active(&policy.domain, now.with_timezone(&Utc)) {
            return None;
        }
        if self
            .ledger
            .status(&policy.domain, policy, self.day.ledger_day(now))
            .is_exhausted
        {
            return None;
        }
        Some(ActiveTrackedTab {
            tab_id,
            domain: policy.domain.clone(),
            url: url.to_string(),
        })
    }

    /// Recompute which tab accrues time.
    fn refresh_tracking(&mut self, now: DateTime<Local>, events: &mut Vec<Event>) {
        let candidate = self
            .tracker
            .candidate()
            .and_then(|tab| Some((tab.tab_id, tab.url.clone()?)));
        let next = candidate.and_then(|(tab_id, url)| self.trackable(tab_id, &url, now));
        if self.tracker.set_tracked(next.clone()) {
            debug!(tab = ?next.as_ref().map(|t| t.tab_id), "tracking changed");
            events.push(Event::TrackingChanged {
                tab_id: next.as_ref().map(|t| t.tab_id),
                domain: next.map(|t| t.domain),
            });
        }
    }

    /// Open tabs (sorted by id) whose URL resolves to `domain`.
    fn tabs_on_domain(&mut self, domain: &str) -> Vec<TabId> {
        let mut tabs: Vec<(TabId, String)> = self
            .tracker
            .tabs()
            .filter_map(|t| Some((t.tab_id, hostname_from_url(t.url.as_deref()?)?)))
            .collect();
        tabs.sort_unstable_by_key(|(id, _)| *id);
        tabs.into_iter()
            .filter(|(_, host)| {
                self.matcher
                    .find(host, &self.config.sites)
                    .is_some_and(|p| p.domain == domain)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Lift overlays from a domain's tabs after access was granted.
    fn release_domain(&mut self, domain: &str, events: &mut Vec<Event>) {
        for tab_id in self.tabs_on_domain(domain) {
            events.push(Event::RemoveOverlay { tab_id });
        }
    }

    /// Put overlays back on a domain's tabs after access was taken away.
    fn reevaluate_domain(&mut self, domain: &str, now: DateTime<Local>, events: &mut Vec<Event>) {
        for tab_id in self.tabs_on_domain(domain) {
            let Some(host) = self
                .tracker
                .tab(tab_id)
                .and_then(|t| hostname_from_url(t.url.as_deref()?))
            else {
                continue;
            };
            let check = self.evaluate(&host, now);
            if let Some(overlay) = overlay_for(check.decision) {
                events.push(Event::ShowOverlay {
                    tab_id,
                    domain: domain.to_string(),
                    overlay,
                });
            }
        }
    }

    fn after_revoke(&mut self, domains: &[String], now: DateTime<Local>, events: &mut Vec<Event>) {
        for domain in domains {
            events.push(Event::ClearAlarm {
                name: alarm_name(domain),
            });
            events.push(Event::PassRevoked {
                domain: domain.clone(),
            });
            self.reevaluate_domain(domain, now, events);
        }
        self.refresh_tracking(now, events);
    }

    /// Reset the ledger if the local date changed. Returns `true` on rollover.
    fn roll_day(&mut self, now: DateTime<Local>, events: &mut Vec<Event>) -> Result<bool> {
        let DayChange::Rolled { from, to } = self.day.observe(now.date_naive()) else {
            return Ok(false);
        };
        self.reset_day(to)?;
        info!(%from, %to, "day rolled over; ration usage reset");
        events.push(Event::DayRolledOver { date: to });
        events.push(Event::ScheduleAlarm {
            name: MIDNIGHT_ALARM.to_string(),
            at: DayBoundary::next_midnight(now),
        });
        self.refresh_tracking(now, events);
        Ok(true)
    }

    fn reset_day(&mut self, today: NaiveDate) -> Result<(), StorageError> {
        self.ledger.reset_for_new_day(today);
        self.persist_usage()?;
        self.persist_overtime()
    }

    fn persist_usage(&mut self) -> Result<(), StorageError> {
        save_json(&self.store, keys::RATION_USAGE, self.ledger.usage())?;
        self.ledger.mark_usage_clean();
        Ok(())
    }

    fn persist_overtime(&mut self) -> Result<(), StorageError> {
        save_json(&self.store, keys::RATION_OVERTIME, self.ledger.overtime())?;
        self.ledger.mark_overtime_clean();
        Ok(())
    }

    fn persist_passes(&mut self) -> Result<(), StorageError> {
        save_json(&self.store, keys::PASSES, self.passes.all())?;
        self.passes.mark_clean();
        Ok(())
    }
}
