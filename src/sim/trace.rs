//! Simulation output: samples, event records, statistics.

use glam::DVec2;

use crate::contact::FrictionRegime;
use crate::energy::EnergyBreakdown;
use crate::error::{SimError, Warning};

/// Pose and velocity of one body at a sample time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodySample {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

/// One recorded instant: time, per-body state, energy triple.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    pub t: f64,
    pub bodies: Vec<BodySample>,
    pub energy: EnergyBreakdown,
}

/// Payload attached to an event record by its action.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventInfo {
    /// A contact impulse was applied.
    Contact {
        impulse: DVec2,
        jn: f64,
        jt: f64,
        regime: FrictionRegime,
        dissipated: f64,
    },
    /// Phase switch marker; state untouched.
    Phase { payload: String },
    /// Simulation stopped by the event.
    Stop,
    /// Caller-defined marker; state untouched.
    Custom { payload: String },
}

/// A discrete event located by the driver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventRecord {
    /// Id of the predicate that fired.
    pub id: String,
    /// Event time t*.
    pub t: f64,
    pub info: EventInfo,
}

/// Run statistics.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimStats {
    /// Accepted ordinary steps.
    pub steps: usize,
    /// Rejected step attempts.
    pub rejects: usize,
    /// Recorded samples.
    pub sample_count: usize,
    /// Recorded events.
    pub event_count: usize,
    /// Wall-clock time spent in the loop, in milliseconds.
    pub cpu_ms: f64,
    /// Step size at loop exit.
    pub final_h: f64,
    /// True when the loop aborted before t_end.
    pub truncated: bool,
}

/// The full output of one simulation: ordered samples, ordered events, stats.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trace {
    pub samples: Vec<Sample>,
    pub events: Vec<EventRecord>,
    pub stats: SimStats,
}

impl Trace {
    /// First event record with the given id.
    pub fn first_event(&self, id: &str) -> Option<&EventRecord> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Time of the last sample, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s.t)
    }
}

/// What the simulator hands back: whatever trace was produced, plus the
/// accumulated warnings and at most one fatal error.
#[derive(Debug, Clone)]
pub struct SimResult {
    pub trace: Trace,
    pub warnings: Vec<Warning>,
    pub fatal: Option<SimError>,
}

impl SimResult {
    /// True when the run reached t_end without a fatal error.
    pub fn completed(&self) -> bool {
        self.fatal.is_none() && !self.trace.stats.truncated
    }
}
