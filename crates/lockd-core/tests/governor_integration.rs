//! End-to-end governor scenarios.
//!
//! These drive the engine the way a browser host does: tab and focus events,
//! navigations, one tick per second, and page requests.

use chrono::{DateTime, Duration, Local, TimeZone};
use lockd_core::events::{Event, OverlayMode};
use lockd_core::messages::{Request, Response};
use lockd_core::policy::{Decision, MatchMode, SitePolicy};
use lockd_core::scheduler::TickOutcome;
use lockd_core::storage::{keys, save_json, GovernorConfig, MemoryStore, StateStore};
use lockd_core::{GovernorEngine, Navigation, PassKind};

fn start() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
}

fn secs(n: i64) -> DateTime<Local> {
    start() + Duration::seconds(n)
}

fn engine_with(sites: Vec<SitePolicy>) -> GovernorEngine<MemoryStore> {
    let store = MemoryStore::new();
    let config = GovernorConfig {
        sites,
        ..GovernorConfig::default()
    };
    save_json(&store, keys::CONFIG, &config).unwrap();
    GovernorEngine::new(store)
}

fn open(engine: &mut GovernorEngine<MemoryStore>, tab_id: i64, url: &str, at: DateTime<Local>) -> Vec<Event> {
    engine.on_tab_activated(tab_id, Some(1), at);
    engine.on_navigate(
        Navigation {
            tab_id,
            url: url.to_string(),
            frame_id: 0,
        },
        at,
    )
}

fn reddit(minutes: u32) -> SitePolicy {
    SitePolicy::new("reddit.com", "Reddit").with_ration(minutes)
}

fn has_overlay(events: &[Event]) -> bool {
    events.iter().any(|e| matches!(e, Event::ShowOverlay { .. }))
}

#[test]
fn test_sixty_ticks_exhaust_a_one_minute_ration() {
    let mut engine = engine_with(vec![reddit(1)]);
    let events = open(&mut engine, 1, "https://www.reddit.com/r/rust", start());
    assert!(!has_overlay(&events));
    assert_eq!(engine.tracked().map(|t| t.domain.as_str()), Some("reddit.com"));
    assert_eq!(
        engine.check_access("reddit.com", start()).decision,
        Decision::Allow { tracked: true }
    );

    for n in 1..60 {
        let report = engine.try_tick(secs(n)).unwrap();
        assert!(matches!(report.outcome, TickOutcome::Charged { .. }), "tick {n}");
    }

    let report = engine.try_tick(secs(60)).unwrap();
    assert_eq!(
        report.outcome,
        TickOutcome::Exhausted {
            domain: "reddit.com".into(),
            used_seconds: 60
        }
    );
    assert!(report.events.contains(&Event::ShowOverlay {
        tab_id: 1,
        domain: "reddit.com".into(),
        overlay: OverlayMode::RationExpired,
    }));
    assert!(engine.is_exhaustion_latched("reddit.com"));
    assert!(engine.tracked().is_none());
    assert_eq!(
        engine.check_access("reddit.com", secs(61)).decision,
        Decision::RationExpired
    );

    // Coming back to the tab does not prompt again or resume charging.
    let events = engine.on_tab_activated(1, Some(1), secs(62));
    assert!(!has_overlay(&events));
    assert!(!events.iter().any(|e| matches!(e, Event::RationExhausted { .. })));
    assert_eq!(engine.try_tick(secs(63)).unwrap().outcome, TickOutcome::Idle);
}

#[test]
fn test_exhaustion_is_persisted_immediately() {
    let mut engine = engine_with(vec![reddit(1)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    for n in 1..=60 {
        engine.try_tick(secs(n)).unwrap();
    }
    let raw = engine.store().get(keys::RATION_USAGE).unwrap().unwrap();
    let usage: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(usage["reddit.com"]["usedSeconds"], 60);
    assert_eq!(usage["reddit.com"]["date"], "2026-10-17");
}

#[test]
fn test_overtime_after_exhaustion_reopens_the_site() {
    let mut engine = engine_with(vec![reddit(1)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    for n in 1..=60 {
        engine.try_tick(secs(n)).unwrap();
    }
    assert!(engine.is_exhaustion_latched("reddit.com"));

    let (response, events) = engine.handle_request(
        Request::GrantOvertime {
            domain: "reddit.com".into(),
            minutes: 5,
        },
        secs(70),
    );
    assert_eq!(response, Response::ok());
    assert!(events.contains(&Event::OvertimeGranted {
        domain: "reddit.com".into(),
        granted_minutes: 5
    }));
    assert!(events.contains(&Event::RemoveOverlay { tab_id: 1 }));
    assert!(!engine.is_exhaustion_latched("reddit.com"));

    let check = engine.check_access("reddit.com", secs(71));
    assert_eq!(check.decision, Decision::Allow { tracked: true });
    assert_eq!(check.ration.unwrap().remaining_seconds, 300);
    assert_eq!(engine.tracked().map(|t| t.tab_id), Some(1));

    let (response, _) = engine.handle_request(
        Request::GetOvertimeStatus {
            domain: Some("reddit.com".into()),
        },
        secs(72),
    );
    assert_eq!(response, Response::Overtime { granted_minutes: 5 });
}

#[test]
fn test_focus_loss_pauses_accrual() {
    let mut engine = engine_with(vec![reddit(5)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    for n in 1..=10 {
        engine.try_tick(secs(n)).unwrap();
    }

    let events = engine.on_window_focus_changed(None, secs(11));
    assert!(events.contains(&Event::TrackingChanged {
        tab_id: None,
        domain: None
    }));
    for n in 12..=30 {
        assert_eq!(engine.try_tick(secs(n)).unwrap().outcome, TickOutcome::Idle);
    }
    let used = engine
        .check_access("reddit.com", secs(31))
        .ration
        .unwrap()
        .used_seconds;
    assert_eq!(used, 10);

    engine.on_window_focus_changed(Some(1), secs(32));
    assert_eq!(
        engine.try_tick(secs(33)).unwrap().outcome,
        TickOutcome::Charged {
            domain: "reddit.com".into(),
            used_seconds: 11
        }
    );
}

#[test]
fn test_switching_tabs_moves_tracking() {
    let mut engine = engine_with(vec![reddit(5), SitePolicy::new("youtube.com", "YouTube")]);
    open(&mut engine, 1, "https://reddit.com/", start());
    assert_eq!(engine.tracked().map(|t| t.tab_id), Some(1));

    open(&mut engine, 2, "https://example.org/", secs(1));
    assert!(engine.tracked().is_none());
    assert_eq!(engine.try_tick(secs(2)).unwrap().outcome, TickOutcome::Idle);

    engine.on_tab_activated(1, Some(1), secs(3));
    assert_eq!(engine.tracked().map(|t| t.tab_id), Some(1));

    engine.on_tab_removed(1, secs(4));
    assert!(engine.tracked().is_none());
}

#[test]
fn test_blocked_beats_an_active_pass() {
    let mut engine = engine_with(vec![SitePolicy::new("x.com", "X").with_blocked(true)]);
    let (response, _) = engine.handle_request(
        Request::GrantPass {
            domain: "x.com".into(),
            kind: PassKind::Work,
            duration_minutes: 30,
        },
        start(),
    );
    assert_eq!(response, Response::ok());

    let events = open(&mut engine, 1, "https://x.com/home", secs(1));
    assert!(events.contains(&Event::ShowOverlay {
        tab_id: 1,
        domain: "x.com".into(),
        overlay: OverlayMode::Blocked,
    }));
}

#[test]
fn test_pass_bypasses_exhausted_ration_without_charging() {
    let mut engine = engine_with(vec![reddit(1)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    for n in 1..=60 {
        engine.try_tick(secs(n)).unwrap();
    }
    engine.handle_request(
        Request::GrantPass {
            domain: "www.reddit.com".into(),
            kind: PassKind::Private,
            duration_minutes: 15,
        },
        secs(61),
    );
    assert_eq!(
        engine.check_access("reddit.com", secs(62)).decision,
        Decision::Allow { tracked: false }
    );
    assert!(engine.tracked().is_none());
    assert_eq!(engine.try_tick(secs(63)).unwrap().outcome, TickOutcome::Idle);

    let (response, _) = engine.handle_request(Request::GetAllPasses, secs(64));
    let Response::Passes(passes) = response else {
        panic!("expected passes");
    };
    assert!(passes.contains_key("reddit.com"));
}

#[test]
fn test_pass_granted_mid_session_stops_charging() {
    let mut engine = engine_with(vec![reddit(5)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    engine.try_tick(secs(1)).unwrap();
    engine.handle_request(
        Request::GrantPass {
            domain: "reddit.com".into(),
            kind: PassKind::Work,
            duration_minutes: 30,
        },
        secs(2),
    );
    assert!(engine.tracked().is_none());
    assert_eq!(engine.try_tick(secs(3)).unwrap().outcome, TickOutcome::Idle);
}

#[test]
fn test_stale_pass_alarm_is_a_noop() {
    let mut engine = engine_with(vec![SitePolicy::new("youtube.com", "YouTube")]);
    let grant = |minutes| Request::GrantPass {
        domain: "youtube.com".into(),
        kind: PassKind::Private,
        duration_minutes: minutes,
    };
    engine.handle_request(grant(5), start());
    // Re-granted before the first alarm fires.
    engine.handle_request(grant(5), secs(240));

    let events = engine.on_alarm("pass-youtube.com", secs(300)).unwrap();
    assert!(events.is_empty());
    assert_eq!(
        engine.check_access("youtube.com", secs(301)).decision,
        Decision::Allow { tracked: false }
    );

    let events = engine.on_alarm("pass-youtube.com", secs(540)).unwrap();
    assert!(events.contains(&Event::PassExpired {
        domain: "youtube.com".into()
    }));
    assert_eq!(
        engine.check_access("youtube.com", secs(541)).decision,
        Decision::ChooseAccess
    );
}

#[test]
fn test_revoke_all_reapplies_overlays() {
    let mut engine = engine_with(vec![
        SitePolicy::new("youtube.com", "YouTube"),
        SitePolicy::new("twitch.tv", "Twitch"),
    ]);
    for domain in ["youtube.com", "twitch.tv"] {
        engine.handle_request(
            Request::GrantPass {
                domain: domain.into(),
                kind: PassKind::Work,
                duration_minutes: 30,
            },
            start(),
        );
    }
    open(&mut engine, 1, "https://youtube.com/", secs(1));
    open(&mut engine, 2, "https://www.twitch.tv/", secs(2));

    let (_, events) = engine.handle_request(Request::RevokeAllPasses, secs(3));
    for (tab_id, domain) in [(1, "youtube.com"), (2, "twitch.tv")] {
        assert!(events.contains(&Event::ClearAlarm {
            name: format!("pass-{domain}")
        }));
        assert!(events.contains(&Event::ShowOverlay {
            tab_id,
            domain: domain.into(),
            overlay: OverlayMode::Choose,
        }));
    }
}

#[test]
fn test_overlapping_tick_is_skipped() {
    let mut engine = engine_with(vec![reddit(5)]);
    open(&mut engine, 1, "https://reddit.com/", start());

    let gate = engine.tick_gate();
    let permit = gate.try_enter().unwrap();
    assert_eq!(engine.try_tick(secs(1)).unwrap().outcome, TickOutcome::Skipped);

    let report = engine.tick_with(&permit, secs(1)).unwrap();
    assert_eq!(
        report.outcome,
        TickOutcome::Charged {
            domain: "reddit.com".into(),
            used_seconds: 1
        }
    );
    drop(permit);
    assert!(matches!(
        engine.try_tick(secs(2)).unwrap().outcome,
        TickOutcome::Charged { used_seconds: 2, .. }
    ));
}

#[test]
fn test_feelings_prompt_after_ration() {
    let mut engine = engine_with(vec![reddit(1).with_feelings_prompt(true)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    let mut last = None;
    for n in 1..=60 {
        last = Some(engine.try_tick(secs(n)).unwrap());
    }
    let report = last.unwrap();
    assert!(report.events.contains(&Event::ShowOverlay {
        tab_id: 1,
        domain: "reddit.com".into(),
        overlay: OverlayMode::Feelings { pass_duration: 1 },
    }));

    engine.handle_request(
        Request::LogFeeling {
            domain: "reddit.com".into(),
            feeling: lockd_core::Feeling::Negative,
            duration_minutes: 1,
        },
        secs(70),
    );
    let (response, _) = engine.handle_request(Request::GetFeelings, secs(71));
    let Response::Feelings(entries) = response else {
        panic!("expected feelings");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].domain, "reddit.com");
}

#[test]
fn test_invalid_regex_site_is_ungoverned() {
    let mut engine = engine_with(vec![
        SitePolicy::new("([", "Broken").with_match(MatchMode::Regex),
        SitePolicy::new(r"^news\.ycombinator\.com$", "HN").with_match(MatchMode::Regex),
    ]);
    assert_eq!(engine.check_access("anything.com", start()).domain, None);
    assert_eq!(
        engine.check_access("news.ycombinator.com", start()).decision,
        Decision::ChooseAccess
    );
    // Regex sees the raw hostname, so www. is not stripped.
    assert_eq!(
        engine.check_access("www.news.ycombinator.com", start()).decision,
        Decision::Allow { tracked: false }
    );
}

#[test]
fn test_legacy_config_is_migrated_on_load() {
    let store = MemoryStore::new();
    store
        .set(
            keys::CONFIG,
            r#"{"sites":[{"domain":"reddit.com","name":"Reddit","work":true,"private":true}],"privateDuration":20}"#,
        )
        .unwrap();
    let mut engine = GovernorEngine::new(store);
    engine.ensure_initialized(start()).unwrap();

    assert_eq!(engine.config().private_duration_max, 20);
    assert_eq!(engine.config().private_duration_default, 20);
    let raw = engine.store().get(keys::CONFIG).unwrap().unwrap();
    assert!(!raw.contains("\"privateDuration\""));
    assert!(raw.contains("\"privateDurationMax\":20"));
}

#[test]
fn test_tick_rolls_the_day_without_an_alarm() {
    let mut engine = engine_with(vec![reddit(1)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    for n in 1..=60 {
        engine.try_tick(secs(n)).unwrap();
    }
    let tomorrow = start() + Duration::days(1);
    engine.on_tab_activated(1, Some(1), tomorrow);
    let report = engine.try_tick(tomorrow + Duration::seconds(1)).unwrap();
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, Event::DayRolledOver { .. })));
    assert!(!engine.is_exhaustion_latched("reddit.com"));
    assert_eq!(
        report.outcome,
        TickOutcome::Charged {
            domain: "reddit.com".into(),
            used_seconds: 1
        }
    );
}

#[test]
fn test_reload_keeps_unflushed_usage() {
    let mut engine = engine_with(vec![reddit(5)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    for n in 1..=10 {
        engine.try_tick(secs(n)).unwrap();
    }

    // A browser restart reloads state well before the next periodic flush.
    engine.load_from_storage(secs(11)).unwrap();
    let ration = engine.check_access("reddit.com", secs(11)).ration.unwrap();
    assert_eq!(ration.used_seconds, 10);

    let report = engine.try_tick(secs(12)).unwrap();
    assert_eq!(
        report.outcome,
        TickOutcome::Charged {
            domain: "reddit.com".into(),
            used_seconds: 11
        }
    );
}

#[test]
fn test_clock_stepping_back_keeps_todays_usage() {
    let mut engine = engine_with(vec![reddit(5)]);
    let after_midnight = Local.with_ymd_and_hms(2026, 10, 18, 0, 0, 30).unwrap();
    open(&mut engine, 1, "https://reddit.com/", after_midnight);
    for n in 1..=100 {
        engine.try_tick(after_midnight + Duration::seconds(n)).unwrap();
    }

    let stepped_back = Local.with_ymd_and_hms(2026, 10, 17, 23, 59, 0).unwrap();
    let report = engine.try_tick(stepped_back).unwrap();
    assert_eq!(
        report.outcome,
        TickOutcome::Charged {
            domain: "reddit.com".into(),
            used_seconds: 101
        }
    );

    let corrected = Local.with_ymd_and_hms(2026, 10, 18, 0, 3, 0).unwrap();
    let report = engine.try_tick(corrected).unwrap();
    assert!(!report
        .events
        .iter()
        .any(|e| matches!(e, Event::DayRolledOver { .. })));
    assert_eq!(
        report.outcome,
        TickOutcome::Charged {
            domain: "reddit.com".into(),
            used_seconds: 102
        }
    );
}

#[test]
fn test_failed_teardown_keeps_state_loaded() {
    let mut engine = engine_with(vec![reddit(5)]);
    open(&mut engine, 1, "https://reddit.com/", start());
    for n in 1..=5 {
        engine.try_tick(secs(n)).unwrap();
    }

    engine.store().set_failing(true);
    assert!(engine.teardown(secs(6)).is_err());
    assert!(engine.is_initialized());
    assert!(engine.tracked().is_some());

    engine.store().set_failing(false);
    let events = engine.teardown(secs(7)).unwrap();
    assert!(events.contains(&Event::ClearAlarm {
        name: "midnight-reset".into()
    }));
    assert!(!engine.is_initialized());

    let raw = engine.store().get(keys::RATION_USAGE).unwrap().unwrap();
    let usage: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(usage["reddit.com"]["usedSeconds"], 5);
}
