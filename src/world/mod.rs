//! Scene description: world frame, bodies, surfaces, and the force model.
//!
//! The [`Dynamics`] trait defines the interface the integrators pull
//! derivatives through. Concrete implementations include:
//!
//! - [`UniformGravity`] -- every body accelerated by the world gravity vector
//! - any closure `Fn(t, q, v, qd, vd)` compiled by an upstream layer

mod body;
mod scene;
mod surface;

pub use body::{Body, BodyInit, BodyKind, Material, Shape};
pub use scene::Scene;
pub use surface::Surface;

use glam::DVec2;
use std::collections::BTreeMap;

/// Orientation of the world y-axis.
///
/// Informational for upstream layers; the core works with the gravity vector
/// as given and folds the axis convention into `|g_y|` when computing
/// potential energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WorldFrame {
    #[default]
    YUp,
    YDown,
}

/// World-level scene parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct World {
    pub coord: WorldFrame,
    /// Constant gravity vector in m/s^2.
    pub gravity: DVec2,
    /// Named scalars carried through from the contract. Informational.
    pub constants: BTreeMap<String, f64>,
}

impl World {
    pub fn new(coord: WorldFrame, gravity: DVec2) -> Self {
        Self {
            coord,
            gravity,
            constants: BTreeMap::new(),
        }
    }

    /// Standard y-up frame with gravity (0, -9.8).
    pub fn y_up_standard() -> Self {
        Self::new(WorldFrame::YUp, DVec2::new(0.0, -9.8))
    }
}

/// The derivative function f: (t, q, v) -> (q_dot, v_dot).
///
/// Compiled by the layer upstream of the core; the simulator treats it as an
/// opaque callable and assumes it is Lipschitz-continuous between events.
/// Outputs are written into the caller-provided slices so the integrator hot
/// path stays allocation-free.
pub trait Dynamics {
    fn eval(&self, t: f64, q: &[f64], v: &[f64], qd: &mut [f64], vd: &mut [f64]);
}

impl<F> Dynamics for F
where
    F: Fn(f64, &[f64], &[f64], &mut [f64], &mut [f64]),
{
    fn eval(&self, t: f64, q: &[f64], v: &[f64], qd: &mut [f64], vd: &mut [f64]) {
        self(t, q, v, qd, vd)
    }
}

/// Free flight under the constant world gravity vector.
///
/// q_dot = v; v_dot = (g_x, g_y, 0) per body. This is the force model for
/// every ballistic phase of a scene and the reference dynamics for tests.
#[derive(Debug, Clone, Copy)]
pub struct UniformGravity {
    gravity: DVec2,
}

impl UniformGravity {
    pub fn new(gravity: DVec2) -> Self {
        Self { gravity }
    }

    /// Gravity taken from a scene's world description.
    pub fn from_scene(scene: &Scene) -> Self {
        Self::new(scene.world.gravity)
    }
}

impl Dynamics for UniformGravity {
    fn eval(&self, _t: f64, _q: &[f64], v: &[f64], qd: &mut [f64], vd: &mut [f64]) {
        qd.copy_from_slice(v);
        for chunk in vd.chunks_exact_mut(3) {
            chunk[0] = self.gravity.x;
            chunk[1] = self.gravity.y;
            chunk[2] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_gravity_fills_per_body_acceleration() {
        let g = UniformGravity::new(DVec2::new(0.0, -9.8));
        let q = [0.0; 6];
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut qd = [0.0; 6];
        let mut vd = [0.0; 6];
        g.eval(0.0, &q, &v, &mut qd, &mut vd);
        assert_eq!(qd, v);
        assert_eq!(vd, [0.0, -9.8, 0.0, 0.0, -9.8, 0.0]);
    }

    #[test]
    fn closures_are_dynamics() {
        let f = |_t: f64, _q: &[f64], v: &[f64], qd: &mut [f64], vd: &mut [f64]| {
            qd.copy_from_slice(v);
            vd.fill(0.0);
        };
        let d: &dyn Dynamics = &f;
        let mut qd = [0.0; 3];
        let mut vd = [1.0; 3];
        d.eval(0.0, &[0.0; 3], &[2.0; 3], &mut qd, &mut vd);
        assert_eq!(qd, [2.0; 3]);
        assert_eq!(vd, [0.0; 3]);
    }
}
