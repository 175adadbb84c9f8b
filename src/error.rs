//! Error and warning types for the simulation core.
//!
//! Contract problems are caught before the time loop starts and surfaced as
//! [`ConfigError`]. Anything that goes wrong mid-run becomes at most one
//! [`SimError`] (the loop aborts and the partial trace is kept) or a
//! [`Warning`] (the loop continues).

use thiserror::Error;

/// A caller-supplied contract violates the data-model invariants.
///
/// Detected synchronously before the first step; no trace is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("body id must be a unique non-empty string")]
    EmptyBodyId,

    #[error("duplicate body id `{0}`")]
    DuplicateBodyId(String),

    #[error("duplicate surface id `{0}`")]
    DuplicateSurfaceId(String),

    #[error("body `{id}` has non-positive mass {mass}")]
    NonPositiveMass { id: String, mass: f64 },

    #[error("body `{id}` has non-positive inertia {inertia}")]
    NonPositiveInertia { id: String, inertia: f64 },

    #[error("body `{id}` restitution {restitution} outside [0, 1]")]
    RestitutionOutOfRange { id: String, restitution: f64 },

    #[error("body `{id}` friction invalid: mu_s = {mu_s}, mu_k = {mu_k} (need 0 <= mu_k <= mu_s)")]
    FrictionInvalid { id: String, mu_s: f64, mu_k: f64 },

    #[error("surface `{0}` has a degenerate normal (length ~ 0)")]
    DegenerateNormal(String),

    #[error("body `{body}` permits contact with unknown surface `{surface}`")]
    UnknownSurfaceRef { body: String, surface: String },

    #[error("event `{id}` references body index {index} but the scene has {len} bodies")]
    EventBodyOutOfRange { id: String, index: usize, len: usize },

    #[error("event `{id}` references surface index {index} but the scene has {len} surfaces")]
    EventSurfaceOutOfRange { id: String, index: usize, len: usize },

    #[error("step control violates 0 < h_min <= h0 <= h_max (h0 = {h0}, h_min = {h_min}, h_max = {h_max})")]
    InvalidStepControl { h0: f64, h_min: f64, h_max: f64 },

    #[error("solver tolerance must be positive, got {0}")]
    NonPositiveTolerance(f64),

    #[error("simulation duration t_end must be finite and non-negative, got {0}")]
    InvalidDuration(f64),
}

/// Arithmetic inconsistency inside the contact impulse resolver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContactError {
    #[error("contact resolution produced a non-finite impulse")]
    NonFinite,

    #[error("contact gained kinetic energy: dissipated = {0} < -1e-9")]
    NegativeDissipation(f64),
}

/// Fatal mid-run failure. The trace up to the failure point is preserved and
/// its statistics are flagged as truncated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("integrator produced a non-finite state component at t = {t}")]
    NonFiniteState { t: f64 },

    #[error("step size reduced to h_min without acceptance at t = {t}")]
    StepTooSmall { t: f64 },

    #[error("contact resolution failed at t = {t}: {source}")]
    Contact {
        t: f64,
        #[source]
        source: ContactError,
    },
}

/// Non-fatal diagnostics accumulated during a run.
///
/// Every warning is also emitted through the [`log`] facade at `warn` level.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    #[error("event `{id}`: root refinement did not converge, fired at interval midpoint t = {t}")]
    RootNoConvergence { id: String, t: f64 },

    #[error("step size floored at h_min = {h_min} near t = {t}")]
    StepFloor { t: f64, h_min: f64 },

    #[error("friction impulse {jt} outside static cone {cone} at t = {t}")]
    FrictionCone { t: f64, jt: f64, cone: f64 },

    #[error("contact impulse {impulse} below noise floor {floor} at t = {t}")]
    ImpulseBelowFloor { t: f64, impulse: f64, floor: f64 },

    #[error("no acceptance assertions declared; trivially successful")]
    NoAssertions,
}
