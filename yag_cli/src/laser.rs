//! Laser commands: transport assembly, one-shot operations and the monitor loop.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use eyre::WrapErr;
use serde_json::json;
use yag_core::conversions::parse_setting;
use yag_core::{
    ChannelObserver, DynLaser, Event, Field, Intent, LaserBuilder, POLL_ORDER, Payload, Subject,
};
use yag_traits::Transport;

use crate::cli::{Counter, ToggleTarget};

/// Env var naming commands the simulator never answers (comma separated).
pub const SIM_TIMEOUT_ENV: &str = "YAG_SIM_TIMEOUT_ON";
/// Env var naming commands the simulator answers with `?`.
pub const SIM_REJECT_ENV: &str = "YAG_SIM_REJECT_ON";

#[cfg(feature = "hardware")]
pub fn make_transport(cfg: &yag_config::Config) -> Box<dyn Transport + Send> {
    Box::new(yag_hardware::SerialTransport::new(
        cfg.connection.baud_rate,
        Duration::from_millis(cfg.connection.timeout_ms),
    ))
}

#[cfg(not(feature = "hardware"))]
pub fn make_transport(_cfg: &yag_config::Config) -> Box<dyn Transport + Send> {
    let mut sim = yag_hardware::SimulatedLaser::new();
    for (var, timeout) in [(SIM_TIMEOUT_ENV, true), (SIM_REJECT_ENV, false)] {
        let Ok(list) = std::env::var(var) else {
            continue;
        };
        for cmd in list.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            tracing::info!(command = cmd, timeout, "simulator fault injected");
            sim = if timeout {
                sim.timeout_on(cmd)
            } else {
                sim.reject_on(cmd)
            };
        }
    }
    Box::new(sim)
}

pub fn builder(cfg: &yag_config::Config) -> eyre::Result<LaserBuilder> {
    Ok(LaserBuilder::from_config(cfg)?.with_transport(make_transport(cfg)))
}

/// Connect without a worker, for commands that run once and exit.
pub fn connect(cfg: &yag_config::Config) -> eyre::Result<DynLaser> {
    builder(cfg)?.build()
}

pub fn run_status(laser: &mut DynLaser, json: bool) -> eyre::Result<()> {
    let report = laser.poll_cycle(&AtomicBool::new(false));
    let state = laser.snapshot();
    if json {
        let mut fields = serde_json::Map::new();
        for field in POLL_ORDER {
            let value = state.display(field);
            fields.insert(
                field.name().to_string(),
                json!({ "value": value, "stale": state.is_stale(field) }),
            );
        }
        println!(
            "{}",
            json!({
                "phase": laser.phase().to_string(),
                "failed": report.failed.len(),
                "fields": fields,
            })
        );
    } else {
        println!("phase: {}", laser.phase());
        for field in POLL_ORDER {
            let value = state.display(field).unwrap_or_else(|| "-".to_string());
            let mark = if state.is_stale(field) { " (stale)" } else { "" };
            println!("{:<28} {value}{mark}", field.name());
        }
    }
    Ok(())
}

pub fn toggle_intent(target: ToggleTarget) -> Intent {
    match target {
        ToggleTarget::Pump => Intent::TogglePump,
        ToggleTarget::Shutter => Intent::ToggleShutter,
        ToggleTarget::Flashlamp => Intent::ToggleFlashlamp,
        ToggleTarget::Simmer => Intent::ToggleSimmer,
        ToggleTarget::Qswitch => Intent::ToggleQswitch,
        ToggleTarget::Yag => Intent::ToggleYag,
    }
}

pub fn reset_intent(counter: Counter) -> Intent {
    match counter {
        Counter::Flashlamp => Intent::ResetFlashlampUserCounter,
        Counter::Qswitch => Intent::ResetQswitchUserCounter,
    }
}

pub fn set_intent(key: &str, value: &str) -> eyre::Result<Intent> {
    let setting = parse_setting(key, value)?;
    Ok(Intent::Set(setting.validate()?))
}

/// Run one intent and print its outcome.
pub fn run_intent(laser: &mut DynLaser, intent: Intent, json: bool) -> eyre::Result<()> {
    let kind = intent.kind();
    let payload = laser.handle(intent)?;
    if json {
        let mut obj = json!({ "command": format!("{kind:?}"), "ok": true });
        match &payload {
            Payload::Reading(r) => {
                obj["field"] = json!(r.field().name());
                obj["value"] = json!(r.to_string());
            }
            Payload::Raw(raw) => obj["reply"] = json!(raw),
            Payload::Phase(p) => obj["phase"] = json!(p.to_string()),
        }
        println!("{obj}");
    } else {
        match payload {
            Payload::Reading(r) => println!("{}: {r}", r.field()),
            Payload::Raw(raw) => println!("{raw}"),
            Payload::Phase(p) => println!("laser {p}"),
        }
    }
    Ok(())
}

/// Convert `--duration-s`; zero means no limit.
pub fn monitor_duration(secs: Option<f64>) -> eyre::Result<Option<Duration>> {
    let Some(secs) = secs else {
        return Ok(None);
    };
    let d = Duration::try_from_secs_f64(secs).wrap_err_with(|| {
        format!("--duration-s: expected a non-negative number of seconds, got {secs}")
    })?;
    Ok((!d.is_zero()).then_some(d))
}

/// Poll through the worker until `duration` elapses or `shutdown` is set.
pub fn run_monitor(
    cfg: &yag_config::Config,
    duration: Option<Duration>,
    record: Option<&Path>,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let (tx, rx) = xch::unbounded::<Event>();
    let worker = builder(cfg)?.with_observer(ChannelObserver(tx)).spawn()?;
    tracing::info!(port = %cfg.connection.port, "monitor started");

    let mut recorder = match record {
        Some(path) => {
            let mut w = csv::Writer::from_path(path)
                .wrap_err_with(|| format!("create recording {}", path.display()))?;
            w.write_record(["elapsed_s", "field", "value", "error"])?;
            Some(w)
        }
        None => None,
    };

    let start = Instant::now();
    let mut rows = 0usize;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("monitor interrupted");
            break;
        }
        if duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }
        let ev = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(ev) => ev,
            Err(xch::RecvTimeoutError::Timeout) => continue,
            Err(xch::RecvTimeoutError::Disconnected) => break,
        };
        let Subject::Field(field) = ev.subject else {
            continue;
        };
        let elapsed = start.elapsed().as_secs_f64();
        let (value, error) = match &ev.outcome {
            Ok(Payload::Reading(r)) => (r.to_string(), String::new()),
            Ok(other) => (format!("{other:?}"), String::new()),
            Err(e) => (String::new(), e.clone()),
        };
        print_reading(field, &value, &error, elapsed, json);
        if let Some(w) = recorder.as_mut() {
            w.write_record([
                format!("{elapsed:.3}"),
                field.name().to_string(),
                value,
                error,
            ])?;
            rows += 1;
        }
    }

    let phase = worker.phase();
    worker.stop();
    if let Some(mut w) = recorder {
        w.flush()?;
        tracing::info!(rows, "recording written");
    }
    if !json {
        println!("laser {phase}");
    }
    Ok(())
}

fn print_reading(field: Field, value: &str, error: &str, elapsed: f64, json: bool) {
    if json {
        let obj = if error.is_empty() {
            json!({ "t": elapsed, "field": field.name(), "value": value })
        } else {
            json!({ "t": elapsed, "field": field.name(), "error": error })
        };
        println!("{obj}");
    } else if error.is_empty() {
        println!("{elapsed:>8.3}s {:<28} {value}", field.name());
    } else {
        println!("{elapsed:>8.3}s {:<28} STALE ({error})", field.name());
    }
}
