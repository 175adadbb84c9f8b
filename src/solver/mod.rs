//! Numerical integrators for the generalized state.
//!
//! Two methods are available:
//!
//! 1. **RK4** -- Fixed-step classical 4th-order Runge-Kutta. Always accepts.
//! 2. **RK45** -- Embedded Dormand-Prince 5(4) pair with error control.
//!
//! Both are stateless with respect to prior steps; the structs only hold
//! reusable stage storage so the hot path does not allocate.

mod rk4;
mod rk45;
pub mod rootfind;

pub use rk4::Rk4;
pub use rk45::{Rk45, StepOutcome};

use crate::error::ConfigError;

/// Integration method selected by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverKind {
    /// Fixed-step 4th-order Runge-Kutta.
    Rk4,
    /// Adaptive Dormand-Prince 5(4) with local error control.
    Rk45,
}

/// Step-size policy bounds and the RK45 error tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepControl {
    /// Initial step size.
    pub h0: f64,
    /// Lower step bound; the driver never adapts below this.
    pub h_min: f64,
    /// Upper step bound.
    pub h_max: f64,
    /// Local error tolerance for RK45 (max-norm of the embedded estimate).
    pub tol: f64,
}

impl Default for StepControl {
    fn default() -> Self {
        Self {
            h0: 0.01,
            h_min: 1e-6,
            h_max: 0.1,
            tol: 1e-6,
        }
    }
}

impl StepControl {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.h_min > 0.0
            && self.h_min <= self.h0
            && self.h0 <= self.h_max
            && self.h_max.is_finite();
        if !ordered {
            return Err(ConfigError::InvalidStepControl {
                h0: self.h0,
                h_min: self.h_min,
                h_max: self.h_max,
            });
        }
        if !(self.tol > 0.0) || !self.tol.is_finite() {
            return Err(ConfigError::NonPositiveTolerance(self.tol));
        }
        Ok(())
    }
}
