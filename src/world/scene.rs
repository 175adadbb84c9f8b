//! Scene aggregate and contract validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::state::SimState;

use super::{Body, Surface, World};

/// Everything the contract declares about the physical setup: world frame,
/// gravity, bodies in declaration order, and static surfaces.
///
/// The scene is frozen at simulation start; bodies and surfaces live for the
/// whole run and are never reordered.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scene {
    pub world: World,
    pub bodies: Vec<Body>,
    pub surfaces: Vec<Surface>,
}

impl Scene {
    pub fn new(world: World) -> Self {
        Self {
            world,
            bodies: Vec::new(),
            surfaces: Vec::new(),
        }
    }

    pub fn body(mut self, body: Body) -> Self {
        self.bodies.push(body);
        self
    }

    pub fn surface(mut self, surface: Surface) -> Self {
        self.surfaces.push(surface);
        self
    }

    /// Degrees of freedom: 3 per body.
    #[inline]
    pub fn dof(&self) -> usize {
        3 * self.bodies.len()
    }

    /// Index of the body with the given id.
    pub fn body_index(&self, id: &str) -> Option<usize> {
        self.bodies.iter().position(|b| b.id == id)
    }

    /// Index of the surface with the given id.
    pub fn surface_index(&self, id: &str) -> Option<usize> {
        self.surfaces.iter().position(|s| s.id == id)
    }

    /// Pack the declared initial conditions into a generalized state at t = 0.
    pub fn initial_state(&self) -> SimState {
        let mut s = SimState::zeros(self.dof());
        for (i, b) in self.bodies.iter().enumerate() {
            let k = 3 * i;
            s.q[k] = b.init.x;
            s.q[k + 1] = b.init.y;
            s.q[k + 2] = b.init.theta;
            s.v[k] = b.init.vx;
            s.v[k + 1] = b.init.vy;
            s.v[k + 2] = b.init.omega;
        }
        s
    }

    /// Check the data-model invariants the simulator relies on.
    ///
    /// Runs once before the time loop; a failure here produces no trace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut body_ids = HashSet::new();
        for b in &self.bodies {
            if b.id.is_empty() {
                return Err(ConfigError::EmptyBodyId);
            }
            if !body_ids.insert(b.id.as_str()) {
                return Err(ConfigError::DuplicateBodyId(b.id.clone()));
            }
            if !(b.mass > 0.0) || !b.mass.is_finite() {
                return Err(ConfigError::NonPositiveMass {
                    id: b.id.clone(),
                    mass: b.mass,
                });
            }
            let inertia = b.inertia();
            if !(inertia > 0.0) || !inertia.is_finite() {
                return Err(ConfigError::NonPositiveInertia {
                    id: b.id.clone(),
                    inertia,
                });
            }
            if !(0.0..=1.0).contains(&b.material.restitution) {
                return Err(ConfigError::RestitutionOutOfRange {
                    id: b.id.clone(),
                    restitution: b.material.restitution,
                });
            }
            if b.material.mu_s < 0.0
                || b.material.mu_k < 0.0
                || b.material.mu_k > b.material.mu_s
            {
                return Err(ConfigError::FrictionInvalid {
                    id: b.id.clone(),
                    mu_s: b.material.mu_s,
                    mu_k: b.material.mu_k,
                });
            }
        }

        let mut surface_ids = HashSet::new();
        for s in &self.surfaces {
            if !surface_ids.insert(s.id.as_str()) {
                return Err(ConfigError::DuplicateSurfaceId(s.id.clone()));
            }
            if !(s.normal.length_squared() > 1e-24) {
                return Err(ConfigError::DegenerateNormal(s.id.clone()));
            }
            if let Some(m) = &s.material {
                if !(0.0..=1.0).contains(&m.restitution) {
                    return Err(ConfigError::RestitutionOutOfRange {
                        id: s.id.clone(),
                        restitution: m.restitution,
                    });
                }
                if m.mu_s < 0.0 || m.mu_k < 0.0 || m.mu_k > m.mu_s {
                    return Err(ConfigError::FrictionInvalid {
                        id: s.id.clone(),
                        mu_s: m.mu_s,
                        mu_k: m.mu_k,
                    });
                }
            }
        }

        for b in &self.bodies {
            if let Some(contacts) = &b.contacts {
                for sid in contacts {
                    if !surface_ids.contains(sid.as_str()) {
                        return Err(ConfigError::UnknownSurfaceRef {
                            body: b.id.clone(),
                            surface: sid.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Material, Shape};
    use glam::DVec2;

    fn ball() -> Body {
        Body::new("ball", Shape::Circle { radius: 0.1 }, 1.0)
    }

    #[test]
    fn valid_scene_passes() {
        let scene = Scene::new(World::y_up_standard())
            .body(ball().at(0.0, 5.0))
            .surface(Surface::new("floor", DVec2::ZERO, DVec2::new(0.0, 1.0)));
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn zero_mass_is_rejected() {
        let mut b = ball();
        b.mass = 0.0;
        let scene = Scene::new(World::y_up_standard()).body(b);
        assert!(matches!(
            scene.validate(),
            Err(ConfigError::NonPositiveMass { .. })
        ));
    }

    #[test]
    fn duplicate_body_ids_are_rejected() {
        let scene = Scene::new(World::y_up_standard()).body(ball()).body(ball());
        assert!(matches!(
            scene.validate(),
            Err(ConfigError::DuplicateBodyId(_))
        ));
    }

    #[test]
    fn kinetic_friction_must_not_exceed_static() {
        let b = ball().material(Material::new(0.5, 0.1, 0.2));
        let scene = Scene::new(World::y_up_standard()).body(b);
        assert!(matches!(
            scene.validate(),
            Err(ConfigError::FrictionInvalid { .. })
        ));
    }

    #[test]
    fn degenerate_normal_is_rejected() {
        let scene = Scene::new(World::y_up_standard())
            .surface(Surface::new("floor", DVec2::ZERO, DVec2::ZERO));
        assert!(matches!(
            scene.validate(),
            Err(ConfigError::DegenerateNormal(_))
        ));
    }

    #[test]
    fn unknown_contact_surface_is_rejected() {
        let mut b = ball();
        b.contacts = Some(vec!["nope".into()]);
        let scene = Scene::new(World::y_up_standard()).body(b);
        assert!(matches!(
            scene.validate(),
            Err(ConfigError::UnknownSurfaceRef { .. })
        ));
    }

    #[test]
    fn initial_state_packs_in_declaration_order() {
        let scene = Scene::new(World::y_up_standard())
            .body(ball().at(1.0, 2.0).moving(0.5, -0.5))
            .body(Body::new("b2", Shape::Point, 2.0).at(3.0, 4.0));
        let s = scene.initial_state();
        assert_eq!(s.q, vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0]);
        assert_eq!(s.v, vec![0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.t, 0.0);
    }
}
