mod cli;
mod error_fmt;
mod laser;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use yag_core::Intent;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        cfg.connection.port = port;
    }
    init_tracing(&cli.log_level, cli.json, &cfg.logging)?;
    tracing::debug!(port = %cfg.connection.port, "config loaded");

    let intent = match cli.cmd {
        Commands::Monitor { duration_s, record } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;
            let duration = laser::monitor_duration(duration_s)?;
            return laser::run_monitor(&cfg, duration, record.as_deref(), cli.json, shutdown);
        }
        Commands::Status => {
            let mut core = laser::connect(&cfg)?;
            return laser::run_status(&mut core, cli.json);
        }
        // Bad values are refused before the port is opened.
        Commands::Set { key, value } => laser::set_intent(&key, &value)?,
        Commands::Toggle { target } => laser::toggle_intent(target),
        Commands::ResetCounter { counter } => laser::reset_intent(counter),
        Commands::Activate => Intent::ActivateYag,
        Commands::Deactivate => Intent::DeactivateYag,
        Commands::Send { raw } => Intent::Custom(raw),
    };
    let mut core = laser::connect(&cfg)?;
    laser::run_intent(&mut core, intent, cli.json)
}

fn load_config(path: Option<&Path>) -> eyre::Result<yag_config::Config> {
    let Some(path) = path else {
        return Ok(yag_config::Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg: yag_config::Config = toml::from_str(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing(level: &str, json: bool, logging: &yag_config::Logging) -> eyre::Result<()> {
    let console_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![console];

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let rotation = match logging.rotation.as_deref() {
            Some("daily") => Rotation::DAILY,
            Some("hourly") => Rotation::HOURLY,
            _ => Rotation::NEVER,
        };
        let (writer, guard) =
            tracing_appender::non_blocking(RollingFileAppender::new(rotation, dir, name));
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}
