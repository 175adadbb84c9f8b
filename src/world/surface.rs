//! Static half-plane surfaces.

use glam::DVec2;

use super::{Material, Shape};

/// An infinite static half-plane: a point on the boundary plus an outward
/// unit normal. Surfaces never move and never accumulate energy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Surface {
    pub id: String,
    /// Any point on the boundary line.
    pub point: DVec2,
    /// Outward normal as declared. Normalized on use; validation rejects
    /// degenerate lengths.
    pub normal: DVec2,
    /// Contact material; when absent the touching body's material governs.
    pub material: Option<Material>,
}

impl Surface {
    pub fn new(id: impl Into<String>, point: DVec2, normal: DVec2) -> Self {
        Self {
            id: id.into(),
            point,
            normal,
            material: None,
        }
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    /// Normal scaled to unit length.
    #[inline]
    pub fn unit_normal(&self) -> DVec2 {
        self.normal.normalize()
    }

    /// Signed clearance of a shape above this surface: the distance from the
    /// shape's extreme point toward the surface to the boundary, measured
    /// along the outward normal. Negative means penetration.
    pub fn signed_clearance(&self, shape: &Shape, center: DVec2, theta: f64) -> f64 {
        let n = self.unit_normal();
        let deepest = shape.support(center, theta, -n);
        (deepest - self.point).dot(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clearance_of_circle_above_floor() {
        let floor = Surface::new("floor", DVec2::ZERO, DVec2::new(0.0, 1.0));
        let shape = Shape::Circle { radius: 0.1 };
        // Center at y = 5: bottom of the ball is at 4.9.
        assert_relative_eq!(
            floor.signed_clearance(&shape, DVec2::new(0.0, 5.0), 0.0),
            4.9
        );
        // Center at y = 0.05: ball penetrates by 0.05.
        assert_relative_eq!(
            floor.signed_clearance(&shape, DVec2::new(0.0, 0.05), 0.0),
            -0.05
        );
    }

    #[test]
    fn unit_normal_rescales_declared_normal() {
        let s = Surface::new("wall", DVec2::ZERO, DVec2::new(0.0, 2.0));
        assert_relative_eq!(s.unit_normal().y, 1.0);
        assert_relative_eq!(s.unit_normal().length(), 1.0);
    }

    #[test]
    fn inclined_clearance_matches_projection() {
        let deg30 = 30.0_f64.to_radians();
        let incline = Surface::new(
            "incline",
            DVec2::ZERO,
            DVec2::new(-deg30.sin(), deg30.cos()),
        );
        let shape = Shape::Point;
        // A point one meter along the normal has clearance one.
        let p = incline.unit_normal() * 1.0;
        assert_relative_eq!(incline.signed_clearance(&shape, p, 0.0), 1.0, epsilon = 1e-12);
    }
}
