//! Transports for the Big Sky laser head.
//!
//! `sim` emulates the firmware in memory and is always available. The RS-232
//! link lives in `serial` behind the `hardware` feature.
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;
pub mod util;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use serial::SerialTransport;
pub use sim::{SimHandle, SimState, SimulatedLaser};
