//! Fixed-step classical 4th-order Runge-Kutta.

use crate::error::SimError;
use crate::state::{Deriv, SimState};
use crate::world::Dynamics;

/// Four-stage RK4 stepper with reusable stage buffers.
///
/// Applied to the first-order system y = (q, v), y_dot = f(t, y). No error
/// estimate; every step is accepted. A non-finite stage output is fatal.
pub struct Rk4 {
    k1: Deriv,
    k2: Deriv,
    k3: Deriv,
    k4: Deriv,
    tmp: SimState,
}

impl Rk4 {
    pub fn new(dof: usize) -> Self {
        Self {
            k1: Deriv::zeros(dof),
            k2: Deriv::zeros(dof),
            k3: Deriv::zeros(dof),
            k4: Deriv::zeros(dof),
            tmp: SimState::zeros(dof),
        }
    }

    /// Advance `state` by one step of size `h` in place.
    pub fn step(&mut self, f: &dyn Dynamics, state: &mut SimState, h: f64) -> Result<(), SimError> {
        let t = state.t;
        let fail = |t| SimError::NonFiniteState { t };

        f.eval(t, &state.q, &state.v, &mut self.k1.dq, &mut self.k1.dv);
        if !self.k1.all_finite() {
            return Err(fail(t));
        }

        self.tmp.assign_add_scaled(state, &[(0.5 * h, &self.k1)]);
        f.eval(t + 0.5 * h, &self.tmp.q, &self.tmp.v, &mut self.k2.dq, &mut self.k2.dv);
        if !self.k2.all_finite() {
            return Err(fail(t));
        }

        self.tmp.assign_add_scaled(state, &[(0.5 * h, &self.k2)]);
        f.eval(t + 0.5 * h, &self.tmp.q, &self.tmp.v, &mut self.k3.dq, &mut self.k3.dv);
        if !self.k3.all_finite() {
            return Err(fail(t));
        }

        self.tmp.assign_add_scaled(state, &[(h, &self.k3)]);
        f.eval(t + h, &self.tmp.q, &self.tmp.v, &mut self.k4.dq, &mut self.k4.dv);
        if !self.k4.all_finite() {
            return Err(fail(t));
        }

        let w = h / 6.0;
        state.add_scaled(&[
            (w, &self.k1),
            (2.0 * w, &self.k2),
            (2.0 * w, &self.k3),
            (w, &self.k4),
        ]);
        state.t = t + h;

        if !state.all_finite() {
            return Err(fail(state.t));
        }
        Ok(())
    }

    /// Integrate from `state.t` to `t_target` in equal sub-steps no larger
    /// than `h_ref`, landing exactly on the target time.
    pub fn integrate_to(
        &mut self,
        f: &dyn Dynamics,
        state: &mut SimState,
        t_target: f64,
        h_ref: f64,
    ) -> Result<(), SimError> {
        let span = t_target - state.t;
        if span <= 0.0 {
            state.t = t_target;
            return Ok(());
        }
        let n = (span / h_ref).ceil().max(1.0) as usize;
        let h = span / n as f64;
        for _ in 0..n {
            self.step(f, state, h)?;
        }
        state.t = t_target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::UniformGravity;
    use approx::assert_relative_eq;
    use glam::DVec2;

    fn drop_state(y0: f64) -> SimState {
        let mut s = SimState::zeros(3);
        s.q[1] = y0;
        s
    }

    #[test]
    fn free_fall_matches_the_closed_form() {
        // RK4 is exact for polynomial trajectories of degree <= 4.
        let g = UniformGravity::new(DVec2::new(0.0, -9.8));
        let mut rk4 = Rk4::new(3);
        let mut s = drop_state(5.0);
        for _ in 0..100 {
            rk4.step(&g, &mut s, 0.01).unwrap();
        }
        assert_relative_eq!(s.t, 1.0, epsilon = 1e-12);
        assert_relative_eq!(s.q[1], 5.0 - 4.9, epsilon = 1e-9);
        assert_relative_eq!(s.v[1], -9.8, epsilon = 1e-9);
    }

    #[test]
    fn harmonic_oscillator_error_shrinks_as_h4() {
        // x'' = -x, x(0) = 1: global error at t = 1 should scale ~ h^4.
        let spring = |_t: f64, q: &[f64], v: &[f64], qd: &mut [f64], vd: &mut [f64]| {
            qd.copy_from_slice(v);
            vd[0] = -q[0];
            vd[1] = 0.0;
            vd[2] = 0.0;
        };

        let run = |h: f64| -> f64 {
            let mut rk4 = Rk4::new(3);
            let mut s = SimState::zeros(3);
            s.q[0] = 1.0;
            let n = (1.0 / h).round() as usize;
            for _ in 0..n {
                rk4.step(&spring, &mut s, h).unwrap();
            }
            (s.q[0] - 1.0_f64.cos()).abs()
        };

        let e1 = run(0.02);
        let e2 = run(0.01);
        let order = (e1 / e2).log2();
        assert!(
            (3.5..4.5).contains(&order),
            "expected ~4th order convergence, got {order:.2} (e1 = {e1:.3e}, e2 = {e2:.3e})"
        );
    }

    #[test]
    fn non_finite_dynamics_is_fatal() {
        let bad = |_t: f64, _q: &[f64], _v: &[f64], qd: &mut [f64], vd: &mut [f64]| {
            qd.fill(f64::NAN);
            vd.fill(0.0);
        };
        let mut rk4 = Rk4::new(3);
        let mut s = SimState::zeros(3);
        assert!(matches!(
            rk4.step(&bad, &mut s, 0.01),
            Err(SimError::NonFiniteState { .. })
        ));
    }

    #[test]
    fn integrate_to_lands_exactly() {
        let g = UniformGravity::new(DVec2::new(0.0, -9.8));
        let mut rk4 = Rk4::new(3);
        let mut s = drop_state(5.0);
        rk4.integrate_to(&g, &mut s, 0.7351, 0.01).unwrap();
        assert_eq!(s.t, 0.7351);
        assert_relative_eq!(s.q[1], 5.0 - 4.9 * 0.7351 * 0.7351, epsilon = 1e-9);
    }
}
