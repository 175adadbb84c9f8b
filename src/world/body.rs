//! Rigid-body description: shape, mass properties, material, initial state.

use glam::DVec2;

/// Informational body category from the contract. Does not affect dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyKind {
    #[default]
    Ball,
    Cart,
    Block,
    Board,
    Point,
    Compound,
}

/// Collision/inertia geometry of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    /// Disc of the given radius.
    Circle { radius: f64 },
    /// Box with the given half-extents, axis-aligned in the body frame.
    Box { half_extents: DVec2 },
    /// Dimensionless point mass.
    Point,
}

impl Shape {
    /// Rotational inertia per unit mass about the center.
    ///
    /// Circle: r^2 / 2. Box: (hx^2 + hy^2) / 3. Point: a vanishing positive
    /// value so the inertia stays invertible (a point contact has r = 0, so
    /// the value never enters an impulse).
    pub fn unit_inertia(&self) -> f64 {
        match *self {
            Shape::Circle { radius } => 0.5 * radius * radius,
            Shape::Box { half_extents } => {
                (half_extents.x * half_extents.x + half_extents.y * half_extents.y) / 3.0
            }
            Shape::Point => 1e-12,
        }
    }

    /// Extreme point of the shape in world direction `dir` (a unit vector),
    /// for a body centered at `center` with orientation `theta`.
    pub fn support(&self, center: DVec2, theta: f64, dir: DVec2) -> DVec2 {
        match *self {
            Shape::Circle { radius } => center + dir * radius,
            Shape::Point => center,
            Shape::Box { half_extents } => {
                let rot = DVec2::from_angle(theta);
                // Direction in the body frame, then pick the matching corner.
                let local = DVec2::from_angle(-theta).rotate(dir);
                let corner = DVec2::new(
                    half_extents.x * local.x.signum(),
                    half_extents.y * local.y.signum(),
                );
                center + rot.rotate(corner)
            }
        }
    }
}

/// Contact material: restitution plus static/kinetic friction coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    /// Coefficient of restitution e in [0, 1].
    pub restitution: f64,
    /// Static friction coefficient, >= 0.
    pub mu_s: f64,
    /// Kinetic friction coefficient, in [0, mu_s].
    pub mu_k: f64,
}

impl Material {
    pub fn new(restitution: f64, mu_s: f64, mu_k: f64) -> Self {
        Self {
            restitution,
            mu_s,
            mu_k,
        }
    }

    /// Perfectly elastic, frictionless.
    pub fn elastic() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    /// Frictionless with the given restitution.
    pub fn frictionless(restitution: f64) -> Self {
        Self::new(restitution, 0.0, 0.0)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.3)
    }
}

/// Initial generalized coordinates and velocities of a body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyInit {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

/// A rigid 2D body as declared by the contract.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Body {
    pub id: String,
    pub kind: BodyKind,
    pub shape: Shape,
    /// Mass in kilograms, > 0.
    pub mass: f64,
    /// Declared rotational inertia; `None` falls back to the shape-derived value.
    pub inertia: Option<f64>,
    pub init: BodyInit,
    pub material: Material,
    /// Surface ids this body is permitted to contact. `None` = all.
    pub contacts: Option<Vec<String>>,
}

impl Body {
    pub fn new(id: impl Into<String>, shape: Shape, mass: f64) -> Self {
        Self {
            id: id.into(),
            kind: BodyKind::default(),
            shape,
            mass,
            inertia: None,
            init: BodyInit::default(),
            material: Material::default(),
            contacts: None,
        }
    }

    pub fn kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.init.x = x;
        self.init.y = y;
        self
    }

    pub fn moving(mut self, vx: f64, vy: f64) -> Self {
        self.init.vx = vx;
        self.init.vy = vy;
        self
    }

    pub fn oriented(mut self, theta: f64, omega: f64) -> Self {
        self.init.theta = theta;
        self.init.omega = omega;
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_inertia(mut self, inertia: f64) -> Self {
        self.inertia = Some(inertia);
        self
    }

    /// Effective rotational inertia: declared, or derived from the shape.
    pub fn inertia(&self) -> f64 {
        self.inertia.unwrap_or(self.mass * self.shape.unit_inertia())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn circle_inertia_is_half_m_r_squared() {
        let b = Body::new("disc", Shape::Circle { radius: 2.0 }, 3.0);
        assert_relative_eq!(b.inertia(), 0.5 * 3.0 * 4.0);
    }

    #[test]
    fn declared_inertia_wins_over_shape() {
        let b = Body::new("disc", Shape::Circle { radius: 2.0 }, 3.0).with_inertia(7.0);
        assert_eq!(b.inertia(), 7.0);
    }

    #[test]
    fn circle_support_is_center_plus_r_dir() {
        let s = Shape::Circle { radius: 0.1 };
        let p = s.support(DVec2::new(1.0, 5.0), 0.3, DVec2::new(0.0, -1.0));
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 4.9);
    }

    #[test]
    fn box_support_picks_the_right_corner() {
        let s = Shape::Box {
            half_extents: DVec2::new(2.0, 1.0),
        };
        // Unrotated, the lowest point in -y is either bottom corner.
        let p = s.support(DVec2::ZERO, 0.0, DVec2::new(0.0, -1.0));
        assert_relative_eq!(p.y, -1.0, epsilon = 1e-12);

        // Rotated 90 degrees the long axis is vertical.
        let p = s.support(DVec2::ZERO, std::f64::consts::FRAC_PI_2, DVec2::new(0.0, -1.0));
        assert_relative_eq!(p.y, -2.0, epsilon = 1e-12);
    }

    #[test]
    fn point_support_is_the_center() {
        let p = Shape::Point.support(DVec2::new(3.0, 4.0), 1.0, DVec2::new(0.0, -1.0));
        assert_eq!(p, DVec2::new(3.0, 4.0));
    }
}
