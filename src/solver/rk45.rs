//! Embedded Dormand-Prince 5(4) adaptive step.

use crate::error::SimError;
use crate::state::{Deriv, SimState};
use crate::world::Dynamics;

use super::StepControl;

/// Result of one attempted RK45 step.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    /// Whether the embedded error estimate met the tolerance.
    pub accepted: bool,
    /// Max-norm of the 5th-vs-4th order difference.
    pub err: f64,
    /// Suggested size for the next attempt.
    pub h_next: f64,
}

/// Dormand-Prince stepper with reusable stage buffers.
///
/// Each attempt produces a 5th-order candidate and a 4th-order embedded
/// estimate; the step is accepted iff the componentwise max-norm of their
/// difference is within the caller's tolerance. The suggested next step is
/// `h * clamp(0.9 * (tol / err)^0.2, 0.5, 2.0)`, with a flat factor of 1.5
/// when the estimate is exactly zero.
pub struct Rk45 {
    k1: Deriv,
    k2: Deriv,
    k3: Deriv,
    k4: Deriv,
    k5: Deriv,
    k6: Deriv,
    k7: Deriv,
    y5: SimState,
    tmp: SimState,
}

impl Rk45 {
    pub fn new(dof: usize) -> Self {
        Self {
            k1: Deriv::zeros(dof),
            k2: Deriv::zeros(dof),
            k3: Deriv::zeros(dof),
            k4: Deriv::zeros(dof),
            k5: Deriv::zeros(dof),
            k6: Deriv::zeros(dof),
            k7: Deriv::zeros(dof),
            y5: SimState::zeros(dof),
            tmp: SimState::zeros(dof),
        }
    }

    /// Evaluate all seven stages from `state` and build the 5th-order
    /// candidate in `self.y5` (FSAL stage k7 is evaluated at the candidate).
    fn stages(&mut self, f: &dyn Dynamics, state: &SimState, h: f64) -> Result<(), SimError> {
        let t = state.t;
        let fail = SimError::NonFiniteState { t };

        f.eval(t, &state.q, &state.v, &mut self.k1.dq, &mut self.k1.dv);
        if !self.k1.all_finite() {
            return Err(fail);
        }

        self.tmp.assign_add_scaled(state, &[(h / 5.0, &self.k1)]);
        f.eval(t + h / 5.0, &self.tmp.q, &self.tmp.v, &mut self.k2.dq, &mut self.k2.dv);
        if !self.k2.all_finite() {
            return Err(fail);
        }

        self.tmp.assign_add_scaled(
            state,
            &[(3.0 * h / 40.0, &self.k1), (9.0 * h / 40.0, &self.k2)],
        );
        f.eval(t + 3.0 * h / 10.0, &self.tmp.q, &self.tmp.v, &mut self.k3.dq, &mut self.k3.dv);
        if !self.k3.all_finite() {
            return Err(fail);
        }

        self.tmp.assign_add_scaled(
            state,
            &[
                (44.0 * h / 45.0, &self.k1),
                (-56.0 * h / 15.0, &self.k2),
                (32.0 * h / 9.0, &self.k3),
            ],
        );
        f.eval(t + 4.0 * h / 5.0, &self.tmp.q, &self.tmp.v, &mut self.k4.dq, &mut self.k4.dv);
        if !self.k4.all_finite() {
            return Err(fail);
        }

        self.tmp.assign_add_scaled(
            state,
            &[
                (19372.0 * h / 6561.0, &self.k1),
                (-25360.0 * h / 2187.0, &self.k2),
                (64448.0 * h / 6561.0, &self.k3),
                (-212.0 * h / 729.0, &self.k4),
            ],
        );
        f.eval(t + 8.0 * h / 9.0, &self.tmp.q, &self.tmp.v, &mut self.k5.dq, &mut self.k5.dv);
        if !self.k5.all_finite() {
            return Err(fail);
        }

        self.tmp.assign_add_scaled(
            state,
            &[
                (9017.0 * h / 3168.0, &self.k1),
                (-355.0 * h / 33.0, &self.k2),
                (46732.0 * h / 5247.0, &self.k3),
                (49.0 * h / 176.0, &self.k4),
                (-5103.0 * h / 18656.0, &self.k5),
            ],
        );
        f.eval(t + h, &self.tmp.q, &self.tmp.v, &mut self.k6.dq, &mut self.k6.dv);
        if !self.k6.all_finite() {
            return Err(fail);
        }

        // 5th-order candidate (k2 has zero weight).
        self.y5.assign_add_scaled(
            state,
            &[
                (35.0 * h / 384.0, &self.k1),
                (500.0 * h / 1113.0, &self.k3),
                (125.0 * h / 192.0, &self.k4),
                (-2187.0 * h / 6784.0, &self.k5),
                (11.0 * h / 84.0, &self.k6),
            ],
        );
        self.y5.t = t + h;
        if !self.y5.all_finite() {
            return Err(fail);
        }

        f.eval(t + h, &self.y5.q, &self.y5.v, &mut self.k7.dq, &mut self.k7.dv);
        if !self.k7.all_finite() {
            return Err(fail);
        }

        Ok(())
    }

    /// Max-norm of the difference between the 5th- and 4th-order solutions.
    fn error_estimate(&self, h: f64) -> f64 {
        let d1 = 35.0 / 384.0 - 5179.0 / 57600.0;
        let d3 = 500.0 / 1113.0 - 7571.0 / 16695.0;
        let d4 = 125.0 / 192.0 - 393.0 / 640.0;
        let d5 = -2187.0 / 6784.0 + 92097.0 / 339200.0;
        let d6 = 11.0 / 84.0 - 187.0 / 2100.0;
        let d7 = -1.0 / 40.0;

        let mut err = 0.0_f64;
        for i in 0..self.k1.dq.len() {
            let eq = h
                * (d1 * self.k1.dq[i]
                    + d3 * self.k3.dq[i]
                    + d4 * self.k4.dq[i]
                    + d5 * self.k5.dq[i]
                    + d6 * self.k6.dq[i]
                    + d7 * self.k7.dq[i]);
            let ev = h
                * (d1 * self.k1.dv[i]
                    + d3 * self.k3.dv[i]
                    + d4 * self.k4.dv[i]
                    + d5 * self.k5.dv[i]
                    + d6 * self.k6.dv[i]
                    + d7 * self.k7.dv[i]);
            err = err.max(eq.abs()).max(ev.abs());
        }
        err
    }

    /// Attempt one step of size `h`. `state` is advanced only on acceptance.
    pub fn try_step(
        &mut self,
        f: &dyn Dynamics,
        state: &mut SimState,
        h: f64,
        tol: f64,
    ) -> Result<StepOutcome, SimError> {
        self.stages(f, state, h)?;
        let err = self.error_estimate(h);
        if !err.is_finite() {
            return Err(SimError::NonFiniteState { t: state.t });
        }

        if err <= tol {
            let factor = if err == 0.0 {
                1.5
            } else {
                (0.9 * (tol / err).powf(0.2)).clamp(0.5, 2.0)
            };
            state.copy_from(&self.y5);
            Ok(StepOutcome {
                accepted: true,
                err,
                h_next: h * factor,
            })
        } else {
            Ok(StepOutcome {
                accepted: false,
                err,
                h_next: 0.5 * h,
            })
        }
    }

    /// Take one step of size `h` unconditionally (used to land exactly on an
    /// event time). Still fatal on non-finite output.
    pub fn force_step(
        &mut self,
        f: &dyn Dynamics,
        state: &mut SimState,
        h: f64,
    ) -> Result<(), SimError> {
        self.stages(f, state, h)?;
        state.copy_from(&self.y5);
        Ok(())
    }

    /// Adaptive integration from `state.t` to `t_target`, overriding the
    /// acceptance criteria only on the final (landing) step.
    pub fn integrate_to(
        &mut self,
        f: &dyn Dynamics,
        state: &mut SimState,
        t_target: f64,
        h_init: f64,
        ctrl: &StepControl,
    ) -> Result<(), SimError> {
        let mut h = h_init.clamp(ctrl.h_min, ctrl.h_max);
        while state.t < t_target {
            let remaining = t_target - state.t;
            if remaining <= h || remaining <= ctrl.h_min {
                self.force_step(f, state, remaining)?;
                break;
            }
            let out = self.try_step(f, state, h, ctrl.tol)?;
            if out.accepted {
                h = out.h_next.clamp(ctrl.h_min, ctrl.h_max);
            } else {
                if h <= ctrl.h_min * (1.0 + 1e-12) {
                    return Err(SimError::StepTooSmall { t: state.t });
                }
                h = (0.5 * h).max(ctrl.h_min);
            }
        }
        state.t = t_target;
        Ok(())
    }
}
