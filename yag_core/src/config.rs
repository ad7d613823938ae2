//! Runtime configuration for the laser core.
//!
//! Separate from the TOML schema in `yag_config`; see `conversions`.
use std::time::Duration;

use crate::sequence::ShutterPolicy;

/// Delays between sub-commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingCfg {
    /// Pause between the steps of activate/deactivate.
    pub settle: Duration,
    /// Pause between Q-switch start/stop and power on/off.
    pub qswitch_settle: Duration,
    /// Worker wait when no intent is pending.
    pub idle: Duration,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(50),
            qswitch_settle: Duration::from_millis(50),
            idle: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceCfg {
    pub shutter_policy: ShutterPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCfg {
    /// Time between poll cycle starts; zero polls back to back with a short
    /// pause between cycles.
    pub interval: Duration,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}
