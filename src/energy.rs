//! Energy and momentum bookkeeping.
//!
//! Side-effect-free ledger over the multi-body state. Potential energy uses
//! |g_y| so "above the origin" is positive in both y-up and y-down frames.

use glam::DVec2;

use crate::state::SimState;
use crate::world::Scene;

/// Kinetic, potential, and total mechanical energy at one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnergyBreakdown {
    pub kinetic: f64,
    pub potential: f64,
    pub total: f64,
}

/// Sum kinetic and potential energy over all bodies.
///
/// E_k = 1/2 m (vx^2 + vy^2) + 1/2 I omega^2, E_p = m |g_y| y.
pub fn energy_of(scene: &Scene, state: &SimState) -> EnergyBreakdown {
    let g_y = scene.world.gravity.y.abs();
    let mut kinetic = 0.0;
    let mut potential = 0.0;
    for (i, body) in scene.bodies.iter().enumerate() {
        let b = state.body(i);
        kinetic += 0.5 * body.mass * (b.vx * b.vx + b.vy * b.vy)
            + 0.5 * body.inertia() * b.omega * b.omega;
        potential += body.mass * g_y * b.y;
    }
    EnergyBreakdown {
        kinetic,
        potential,
        total: kinetic + potential,
    }
}

/// Total linear momentum P = sum(m v).
pub fn linear_momentum(scene: &Scene, state: &SimState) -> DVec2 {
    let mut p = DVec2::ZERO;
    for (i, body) in scene.bodies.iter().enumerate() {
        let b = state.body(i);
        p += body.mass * b.velocity();
    }
    p
}

/// Total angular momentum about the origin: L = sum(I omega + m (r x v)).
pub fn angular_momentum(scene: &Scene, state: &SimState) -> f64 {
    let mut l = 0.0;
    for (i, body) in scene.bodies.iter().enumerate() {
        let b = state.body(i);
        l += body.inertia() * b.omega + body.mass * b.position().perp_dot(b.velocity());
    }
    l
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Body, Shape, World};
    use approx::assert_relative_eq;

    fn one_ball_scene() -> Scene {
        Scene::new(World::y_up_standard())
            .body(Body::new("ball", Shape::Circle { radius: 0.1 }, 2.0).at(0.0, 5.0))
    }

    #[test]
    fn resting_body_has_only_potential_energy() {
        let scene = one_ball_scene();
        let state = scene.initial_state();
        let e = energy_of(&scene, &state);
        assert_eq!(e.kinetic, 0.0);
        assert_relative_eq!(e.potential, 2.0 * 9.8 * 5.0);
        assert_relative_eq!(e.total, e.potential);
    }

    #[test]
    fn kinetic_energy_includes_rotation() {
        let scene = one_ball_scene();
        let mut state = scene.initial_state();
        state.v[0] = 3.0;
        state.v[2] = 10.0;
        let e = energy_of(&scene, &state);
        let inertia = 2.0 * 0.5 * 0.1 * 0.1;
        assert_relative_eq!(e.kinetic, 0.5 * 2.0 * 9.0 + 0.5 * inertia * 100.0);
    }

    #[test]
    fn potential_sign_is_frame_independent() {
        let mut scene = one_ball_scene();
        scene.world.gravity.y = 9.8; // y-down contract, same magnitude
        let state = scene.initial_state();
        let e = energy_of(&scene, &state);
        assert!(e.potential > 0.0);
    }

    #[test]
    fn momenta_sum_over_bodies() {
        let scene = Scene::new(World::y_up_standard())
            .body(Body::new("a", Shape::Point, 1.0).moving(1.0, 0.0))
            .body(Body::new("b", Shape::Point, 3.0).moving(0.0, -2.0));
        let state = scene.initial_state();
        let p = linear_momentum(&scene, &state);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, -6.0);
    }

    #[test]
    fn angular_momentum_tracks_offset_motion() {
        let scene = Scene::new(World::y_up_standard())
            .body(Body::new("a", Shape::Point, 2.0).at(1.0, 0.0).moving(0.0, 3.0));
        let state = scene.initial_state();
        // r x v = 1 * 3 = 3, times mass 2.
        assert_relative_eq!(angular_momentum(&scene, &state), 6.0);
    }
}
