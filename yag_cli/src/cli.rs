//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "yag", version, about = "Nd:YAG laser control CLI")]
pub struct Cli {
    /// Path to config TOML; defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serial port, overriding connection.port from the config
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// Log and print as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ToggleTarget {
    Pump,
    Shutter,
    Flashlamp,
    Simmer,
    Qswitch,
    /// Full activate/deactivate sequence, chosen from the flashlamp mode
    Yag,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Counter {
    Flashlamp,
    Qswitch,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read every field once and print it
    Status,
    /// Poll continuously and print each reading
    Monitor {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long, value_name = "SECS")]
        duration_s: Option<f64>,
        /// Also write every poll reading to this CSV file
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,
    },
    /// Flip one subsystem
    Toggle {
        #[arg(value_enum)]
        target: ToggleTarget,
    },
    /// Write one parameter, e.g. `set frequency 12.5`
    Set {
        /// Parameter name (frequency, voltage, energy, capacitance, trigger, mode, delay, divider, burst, pump, shutter)
        key: String,
        value: String,
    },
    /// Reset a user shot counter to zero
    ResetCounter {
        #[arg(value_enum)]
        counter: Counter,
    },
    /// Run the activation sequence (shutter, Q-switch, flashlamp)
    Activate,
    /// Run the deactivation sequence (flashlamp, Q-switch, shutter)
    Deactivate,
    /// Send a raw command and print the reply verbatim
    Send { raw: String },
}
