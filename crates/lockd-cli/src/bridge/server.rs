//! The host loop: stdin frames, interval ticks, periodic flushes and alarms,
//! all funnelled into one engine behind a mutex.

use std::sync::{Arc, Mutex};

use chrono::Local;
use lockd_core::storage::Database;
use lockd_core::{Event, GovernorEngine, Response, RuntimeSettings, TICK_INTERVAL};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::alarms::AlarmScheduler;
use super::codec::{read_frame, write_frame};
use super::protocol::{parse_inbound, HostEvent, Inbound, Outbound};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type SharedEngine = Arc<Mutex<GovernorEngine<Database>>>;

/// Run `f` against the engine on the blocking pool; SQLite calls block.
async fn with_engine<T, F>(engine: &SharedEngine, f: F) -> Result<T, BoxError>
where
    F: FnOnce(&mut GovernorEngine<Database>) -> T + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(engine);
    let value = tokio::task::spawn_blocking(move || {
        let mut guard = engine
            .lock()
            .map_err(|_| "engine mutex poisoned".to_string())?;
        Ok::<T, String>(f(&mut guard))
    })
    .await??;
    Ok(value)
}

fn send(out: &UnboundedSender<Vec<u8>>, message: &Outbound<'_>) {
    match serde_json::to_vec(message) {
        Ok(body) => {
            let _ = out.send(body);
        }
        Err(e) => warn!(error = %e, "failed to encode outbound message"),
    }
}

/// Alarm commands arm local timers; everything else goes to the extension.
fn apply(events: Vec<Event>, alarms: &mut AlarmScheduler, out: &UnboundedSender<Vec<u8>>) {
    for event in events {
        match event {
            Event::ScheduleAlarm { name, at } => alarms.schedule(&name, at),
            Event::ClearAlarm { name } => alarms.clear(&name),
            other => send(out, &Outbound::Event(&other)),
        }
    }
}

async fn read_stdin(tx: mpsc::Sender<Vec<u8>>) {
    let mut stdin = tokio::io::stdin();
    loop {
        match read_frame(&mut stdin).await {
            Ok(Some(frame)) => {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                // The stream cannot be resynchronised after a bad length prefix.
                warn!(error = %e, "stdin read failed");
                break;
            }
        }
    }
}

async fn write_stdout(mut rx: UnboundedReceiver<Vec<u8>>) {
    let mut stdout = tokio::io::stdout();
    while let Some(body) = rx.recv().await {
        if let Err(e) = write_frame(&mut stdout, &body).await {
            warn!(error = %e, "stdout write failed");
            break;
        }
    }
}

pub async fn run(settings: RuntimeSettings) -> Result<(), BoxError> {
    let path = settings.database_path()?;
    let engine = GovernorEngine::new(Database::open_at(&path)?);
    let gate = engine.tick_gate();
    let engine: SharedEngine = Arc::new(Mutex::new(engine));

    let (mut alarms, mut fired_rx) = AlarmScheduler::new();
    let (in_tx, mut in_rx) = mpsc::channel::<Vec<u8>>(64);
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<Vec<Event>>();
    let reader = tokio::spawn(read_stdin(in_tx));
    let writer = tokio::spawn(write_stdout(out_rx));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %path.display(),
        "native host started"
    );
    match with_engine(&engine, |e| e.ensure_initialized(Local::now())).await? {
        Ok(events) => apply(events, &mut alarms, &out_tx),
        Err(e) => warn!(error = %e, "initial load failed; will retry lazily"),
    }

    // One tick charges one second.
    let mut tick = tokio::time::interval(TICK_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut flush = tokio::time::interval(settings.flush_interval());
    flush.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Both intervals complete their first tick immediately.
    tick.tick().await;
    flush.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let Some(permit) = gate.try_enter() else {
                    debug!("tick skipped: previous tick still running");
                    continue;
                };
                let engine = Arc::clone(&engine);
                let tick_tx = tick_tx.clone();
                tokio::spawn(async move {
                    let report = with_engine(&engine, move |e| e.tick_with(&permit, Local::now())).await;
                    match report {
                        Ok(Ok(report)) => {
                            trace!(outcome = ?report.outcome, "tick");
                            if !report.events.is_empty() {
                                let _ = tick_tx.send(report.events);
                            }
                        }
                        Ok(Err(e)) => warn!(error = %e, "tick failed"),
                        Err(e) => warn!(error = %e, "tick task failed"),
                    }
                });
            }
            _ = flush.tick() => {
                if let Err(e) = with_engine(&engine, |e| e.flush(Local::now())).await? {
                    warn!(error = %e, "periodic flush failed");
                }
            }
            Some((name, generation)) = fired_rx.recv() => {
                if !alarms.take_fired(&name, generation) {
                    continue;
                }
                debug!(alarm = %name, "alarm fired");
                match with_engine(&engine, move |e| e.on_alarm(&name, Local::now())).await? {
                    Ok(events) => apply(events, &mut alarms, &out_tx),
                    Err(e) => warn!(error = %e, "alarm handler failed"),
                }
            }
            Some(events) = tick_rx.recv() => apply(events, &mut alarms, &out_tx),
            frame = in_rx.recv() => {
                let Some(frame) = frame else {
                    info!("stdin closed");
                    break;
                };
                match parse_inbound(&frame) {
                    Inbound::Event(HostEvent::Shutdown) => {
                        info!("shutdown requested");
                        break;
                    }
                    Inbound::Event(event) => {
                        let events = with_engine(&engine, move |e| event.dispatch(e, Local::now())).await?;
                        apply(events, &mut alarms, &out_tx);
                    }
                    Inbound::Request { id, request } => {
                        let (response, events) =
                            with_engine(&engine, move |e| e.handle_request(request, Local::now())).await?;
                        send(&out_tx, &Outbound::Response { id, response: &response });
                        apply(events, &mut alarms, &out_tx);
                    }
                    Inbound::Invalid { id, error } => {
                        warn!(id, error = %error, "invalid message");
                        if let Some(id) = id {
                            let response = Response::error(error);
                            send(&out_tx, &Outbound::Response { id, response: &response });
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    match with_engine(&engine, |e| e.teardown(Local::now())).await {
        Ok(Ok(events)) => apply(events, &mut alarms, &out_tx),
        Ok(Err(e)) => warn!(error = %e, "final flush failed"),
        Err(e) => warn!(error = %e, "teardown task failed"),
    }
    debug!(pending = alarms.len(), "clearing alarms");
    alarms.clear_all();

    drop(out_tx);
    let _ = writer.await;
    reader.abort();
    info!("native host stopped");
    Ok(())
}
