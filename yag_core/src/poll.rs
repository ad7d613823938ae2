//! Periodic refresh of every field.
//!
//! A cycle reads each field once in a fixed order. Reads are isolated: a
//! failure marks that one field stale and the cycle carries on. The shutdown
//! flag is checked before every read so a stop request never waits for a
//! full cycle.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use yag_traits::{Clock, Transport};

use crate::codec::Field;
use crate::device::LaserCore;
use crate::event::{Payload, Subject};

/// Read order of a poll cycle.
pub const POLL_ORDER: [Field; 22] = Field::ALL;

/// Result of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub ok: usize,
    pub failed: Vec<Field>,
    /// Stopped early by the shutdown flag.
    pub interrupted: bool,
}

/// Decides when the next cycle is due.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    interval: Duration,
    last_start: Option<Instant>,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True for the first call and whenever `interval` has elapsed since the
    /// last recorded start.
    pub fn due(&self, now: Instant) -> bool {
        match self.last_start {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= self.interval,
        }
    }

    pub fn mark_started(&mut self, now: Instant) {
        self.last_start = Some(now);
    }

    /// Time left until the next cycle, zero when already due.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_start {
            None => Duration::ZERO,
            Some(t) => self
                .interval
                .saturating_sub(now.saturating_duration_since(t)),
        }
    }
}

impl<T: Transport, C: Clock> LaserCore<T, C> {
    /// Run one poll cycle, emitting one event per field read.
    pub fn poll_cycle(&mut self, shutdown: &AtomicBool) -> PollReport {
        let mut report = PollReport::default();
        for field in POLL_ORDER {
            if shutdown.load(Ordering::Relaxed) {
                trace!("poll cycle interrupted by shutdown");
                report.interrupted = true;
                break;
            }
            let outcome = self.read(field);
            match &outcome {
                Ok(_) => report.ok += 1,
                Err(_) => report.failed.push(field),
            }
            let outcome = outcome
                .map(Payload::Reading)
                .map_err(|e| e.to_string());
            self.emit(Subject::Field(field), outcome);
        }
        self.reconcile_phase();
        debug!(
            ok = report.ok,
            failed = report.failed.len(),
            "poll cycle done"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_waits_for_interval() {
        let t0 = Instant::now();
        let mut s = PollScheduler::new(Duration::from_millis(100));
        assert!(s.due(t0));
        s.mark_started(t0);
        assert!(!s.due(t0 + Duration::from_millis(99)));
        assert_eq!(
            s.remaining(t0 + Duration::from_millis(40)),
            Duration::from_millis(60)
        );
        assert!(s.due(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn zero_interval_is_always_due() {
        let t0 = Instant::now();
        let mut s = PollScheduler::new(Duration::ZERO);
        s.mark_started(t0);
        assert!(s.due(t0));
    }

    #[test]
    fn poll_order_covers_every_field_once() {
        let mut seen = std::collections::HashSet::new();
        for f in POLL_ORDER {
            assert!(seen.insert(f));
        }
        assert_eq!(seen.len(), 22);
    }
}
