//! Packed generalized state for the multi-body system.
//!
//! Bodies contribute three position components (x, y, theta) to `q` and three
//! velocity components (vx, vy, omega) to `v`, concatenated in declaration
//! order. The packing never changes during a run: body `i` always lives at
//! offset `3 * i`.

use glam::DVec2;

/// Phase-space state of the whole scene at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    /// Simulation time in seconds.
    pub t: f64,
    /// Generalized positions, 3 per body: (x, y, theta).
    pub q: Vec<f64>,
    /// Generalized velocities, 3 per body: (vx, vy, omega).
    pub v: Vec<f64>,
}

/// Time derivative of a [`SimState`]: (q_dot, v_dot).
#[derive(Debug, Clone)]
pub struct Deriv {
    pub dq: Vec<f64>,
    pub dv: Vec<f64>,
}

/// Unpacked pose and velocity of a single body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl BodyState {
    /// Center position as a vector.
    #[inline]
    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// Linear velocity as a vector.
    #[inline]
    pub fn velocity(&self) -> DVec2 {
        DVec2::new(self.vx, self.vy)
    }
}

impl SimState {
    /// Zero state with `dof` degrees of freedom (a multiple of 3).
    pub fn zeros(dof: usize) -> Self {
        Self {
            t: 0.0,
            q: vec![0.0; dof],
            v: vec![0.0; dof],
        }
    }

    /// Degrees of freedom (3 x body count).
    #[inline]
    pub fn dof(&self) -> usize {
        self.q.len()
    }

    /// Number of bodies packed into this state.
    #[inline]
    pub fn body_count(&self) -> usize {
        self.q.len() / 3
    }

    /// Copy `src` into `self`, reusing existing storage.
    pub fn copy_from(&mut self, src: &SimState) {
        self.t = src.t;
        self.q.copy_from_slice(&src.q);
        self.v.copy_from_slice(&src.v);
    }

    /// Unpack the state of body `i`.
    pub fn body(&self, i: usize) -> BodyState {
        let k = 3 * i;
        BodyState {
            x: self.q[k],
            y: self.q[k + 1],
            theta: self.q[k + 2],
            vx: self.v[k],
            vy: self.v[k + 1],
            omega: self.v[k + 2],
        }
    }

    /// Overwrite the velocity components of body `i`.
    pub fn set_body_velocity(&mut self, i: usize, velocity: DVec2, omega: f64) {
        let k = 3 * i;
        self.v[k] = velocity.x;
        self.v[k + 1] = velocity.y;
        self.v[k + 2] = omega;
    }

    /// `self = base + sum(scale * deriv)` for each (scale, deriv) term.
    ///
    /// Used by the integrators to build stage evaluation points without
    /// allocating. `self.t` is left for the caller to set.
    pub fn assign_add_scaled(&mut self, base: &SimState, terms: &[(f64, &Deriv)]) {
        for i in 0..self.q.len() {
            let mut q = base.q[i];
            let mut v = base.v[i];
            for &(s, k) in terms {
                q += s * k.dq[i];
                v += s * k.dv[i];
            }
            self.q[i] = q;
            self.v[i] = v;
        }
    }

    /// Accumulate `scale * deriv` terms into `self` in place.
    pub fn add_scaled(&mut self, terms: &[(f64, &Deriv)]) {
        for i in 0..self.q.len() {
            for &(s, k) in terms {
                self.q[i] += s * k.dq[i];
                self.v[i] += s * k.dv[i];
            }
        }
    }

    /// True when every component is finite.
    pub fn all_finite(&self) -> bool {
        self.q.iter().chain(self.v.iter()).all(|x| x.is_finite())
    }
}

impl Deriv {
    pub fn zeros(dof: usize) -> Self {
        Self {
            dq: vec![0.0; dof],
            dv: vec![0.0; dof],
        }
    }

    pub fn all_finite(&self) -> bool {
        self.dq.iter().chain(self.dv.iter()).all(|x| x.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_packing_offsets_are_stable() {
        let mut s = SimState::zeros(6);
        s.q = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        s.v = vec![-1.0, -2.0, -3.0, -4.0, -5.0, -6.0];

        let b0 = s.body(0);
        assert_eq!(b0.x, 1.0);
        assert_eq!(b0.theta, 3.0);
        assert_eq!(b0.omega, -3.0);

        let b1 = s.body(1);
        assert_eq!(b1.y, 5.0);
        assert_eq!(b1.vx, -4.0);
    }

    #[test]
    fn assign_add_scaled_combines_terms() {
        let base = SimState {
            t: 0.0,
            q: vec![1.0, 1.0, 1.0],
            v: vec![0.0, 0.0, 0.0],
        };
        let k1 = Deriv {
            dq: vec![1.0, 2.0, 3.0],
            dv: vec![1.0, 1.0, 1.0],
        };
        let k2 = Deriv {
            dq: vec![10.0, 10.0, 10.0],
            dv: vec![0.0, 0.0, 0.0],
        };
        let mut out = SimState::zeros(3);
        out.assign_add_scaled(&base, &[(0.5, &k1), (0.1, &k2)]);
        assert_eq!(out.q, vec![2.5, 3.0, 3.5]);
        assert_eq!(out.v, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn set_body_velocity_touches_only_that_body() {
        let mut s = SimState::zeros(6);
        s.set_body_velocity(1, DVec2::new(3.0, -2.0), 0.5);
        assert_eq!(s.v, vec![0.0, 0.0, 0.0, 3.0, -2.0, 0.5]);
    }

    #[test]
    fn non_finite_is_detected() {
        let mut s = SimState::zeros(3);
        assert!(s.all_finite());
        s.v[1] = f64::NAN;
        assert!(!s.all_finite());
    }
}
