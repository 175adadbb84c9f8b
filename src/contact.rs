//! Single-point contact impulse resolution.
//!
//! Computes the normal and friction impulse for one contact between a rigid
//! body and a static surface, using the coefficient of restitution and a
//! stick/slip discriminator, then audits the kinetic-energy balance.

use glam::DVec2;

use crate::error::ContactError;
use crate::sim::Tolerances;
use crate::world::Material;

/// Friction regime selected by the discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrictionRegime {
    /// Tangential impulse inside the static cone; tangential motion killed.
    Static,
    /// Tangential impulse capped by kinetic friction.
    Kinetic,
}

/// Snapshot of the colliding body's state and mass properties.
#[derive(Debug, Clone, Copy)]
pub struct ContactBody {
    pub mass: f64,
    pub inertia: f64,
    pub center: DVec2,
    pub velocity: DVec2,
    pub omega: f64,
}

/// Non-fatal observations made while resolving a contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactWarning {
    /// |j_t| exceeded mu_s * |j_n| beyond tolerance.
    ConeViolation { jt: f64, cone: f64 },
    /// Total impulse magnitude below the numerical noise floor.
    BelowImpulseFloor { impulse: f64, floor: f64 },
}

/// The impulse applied at a contact and its bookkeeping.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Total impulse J = j_n * n + j_t * t, applied at the contact point.
    pub impulse: DVec2,
    /// Normal impulse magnitude.
    pub jn: f64,
    /// Tangential impulse magnitude (signed along the tangent).
    pub jt: f64,
    pub regime: FrictionRegime,
    /// Kinetic energy removed by the impulse; >= 0 up to tolerance.
    pub dissipated: f64,
    /// Post-impulse linear velocity of the body.
    pub velocity: DVec2,
    /// Post-impulse angular velocity of the body.
    pub omega: f64,
    /// Normal relative velocity before the impulse.
    pub vn_before: f64,
    /// Normal relative velocity after the impulse.
    pub vn_after: f64,
    pub warnings: Vec<ContactWarning>,
}

/// Resolve a single contact point.
///
/// `contact` is the contact point, `normal` the outward unit normal of the
/// surface at that point. The tangent is the 90-degree rotation of the
/// normal. Returns the applied impulse and the post-impulse velocity; the
/// caller writes the velocity back into the generalized state.
pub fn resolve_contact(
    body: &ContactBody,
    contact: DVec2,
    normal: DVec2,
    material: &Material,
    tol: &Tolerances,
) -> Result<Resolution, ContactError> {
    let n = normal;
    let t = n.perp();
    let r = contact - body.center;

    // Relative velocity at the contact point: v + omega x r.
    let v_rel = body.velocity + body.omega * r.perp();
    let vn = v_rel.dot(n);
    let vt = v_rel.dot(t);

    // Effective masses along the normal and tangent.
    let rxn = r.perp_dot(n);
    let rxt = r.perp_dot(t);
    let inv_mn = 1.0 / body.mass + rxn * rxn / body.inertia;
    let inv_mt = 1.0 / body.mass + rxt * rxt / body.inertia;
    let mn = 1.0 / inv_mn;
    let mt = 1.0 / inv_mt;

    let jn = -(1.0 + material.restitution) * vn * mn;

    // Stick/slip discriminator.
    let (jt, regime) = if vt.abs() < tol.v_eps {
        let jt_stick = -mt * vt;
        if jt_stick.abs() <= material.mu_s * jn.abs() {
            (jt_stick, FrictionRegime::Static)
        } else {
            (-vt.signum() * material.mu_k * jn.abs(), FrictionRegime::Kinetic)
        }
    } else {
        (-vt.signum() * material.mu_k * jn.abs(), FrictionRegime::Kinetic)
    };

    let impulse = jn * n + jt * t;
    let velocity = body.velocity + impulse / body.mass;
    let omega = body.omega + r.perp_dot(impulse) / body.inertia;

    if !impulse.is_finite() || !velocity.is_finite() || !omega.is_finite() {
        return Err(ContactError::NonFinite);
    }

    // Energy audit: the impulse must not inject kinetic energy.
    let ke_before =
        0.5 * body.mass * body.velocity.length_squared() + 0.5 * body.inertia * body.omega * body.omega;
    let ke_after = 0.5 * body.mass * velocity.length_squared() + 0.5 * body.inertia * omega * omega;
    let mut dissipated = ke_before - ke_after;
    if dissipated < -1e-9 {
        return Err(ContactError::NegativeDissipation(dissipated));
    }
    if dissipated < 0.0 {
        dissipated = 0.0;
    }

    let mut warnings = Vec::new();
    let cone = material.mu_s * jn.abs() + 1e-9;
    if jt.abs() > cone {
        warnings.push(ContactWarning::ConeViolation { jt, cone });
    }
    if impulse.length() < tol.impulse_min {
        warnings.push(ContactWarning::BelowImpulseFloor {
            impulse: impulse.length(),
            floor: tol.impulse_min,
        });
    }

    let vn_after = (velocity + omega * r.perp()).dot(n);

    Ok(Resolution {
        impulse,
        jn,
        jt,
        regime,
        dissipated,
        velocity,
        omega,
        vn_before: vn,
        vn_after,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn falling_ball(vy: f64) -> ContactBody {
        ContactBody {
            mass: 1.0,
            inertia: 0.005,
            center: DVec2::new(0.0, 0.1),
            velocity: DVec2::new(0.0, vy),
            omega: 0.0,
        }
    }

    fn floor_normal() -> DVec2 {
        DVec2::new(0.0, 1.0)
    }

    #[test]
    fn elastic_head_on_bounce_reverses_normal_velocity() {
        let body = falling_ball(-9.8);
        let r = resolve_contact(
            &body,
            DVec2::ZERO,
            floor_normal(),
            &Material::elastic(),
            &Tolerances::default(),
        )
        .unwrap();

        assert_relative_eq!(r.vn_before, -9.8);
        assert_relative_eq!(r.vn_after, 9.8, epsilon = 1e-9);
        assert_relative_eq!(r.velocity.y, 9.8, epsilon = 1e-9);
        assert_abs_diff_eq!(r.dissipated, 0.0, epsilon = 1e-9);
        assert_relative_eq!(r.jn, 2.0 * 9.8, epsilon = 1e-9);
    }

    #[test]
    fn restitution_scales_the_rebound_and_dissipates() {
        let body = falling_ball(-10.0);
        let r = resolve_contact(
            &body,
            DVec2::ZERO,
            floor_normal(),
            &Material::frictionless(0.5),
            &Tolerances::default(),
        )
        .unwrap();

        // v_n' = -e * v_n.
        assert_relative_eq!(r.vn_after, 5.0, epsilon = 1e-9);
        // KE drops from 50 to 12.5: 75% of the pre-contact kinetic energy.
        assert_relative_eq!(r.dissipated, 37.5, epsilon = 1e-9);
    }

    #[test]
    fn slow_tangential_motion_sticks() {
        let mut body = falling_ball(-1.0);
        body.velocity.x = 5e-4; // below v_eps
        let mat = Material::new(0.0, 0.8, 0.6);
        let r = resolve_contact(
            &body,
            DVec2::ZERO,
            floor_normal(),
            &mat,
            &Tolerances::default(),
        )
        .unwrap();

        assert_eq!(r.regime, FrictionRegime::Static);
        // Sticking kills the tangential contact-point velocity.
        let t = floor_normal().perp();
        let vt_after = (r.velocity + r.omega * (DVec2::ZERO - body.center).perp()).dot(t);
        assert_abs_diff_eq!(vt_after, 0.0, epsilon = 1e-9);
        // Inside the cone.
        assert!(r.jt.abs() <= mat.mu_s * r.jn.abs() + 1e-9);
    }

    #[test]
    fn fast_tangential_motion_slips_at_the_kinetic_cap() {
        let mut body = falling_ball(-4.0);
        body.velocity.x = 2.0;
        let mat = Material::new(0.0, 0.5, 0.4);
        let r = resolve_contact(
            &body,
            DVec2::ZERO,
            floor_normal(),
            &mat,
            &Tolerances::default(),
        )
        .unwrap();

        assert_eq!(r.regime, FrictionRegime::Kinetic);
        assert_relative_eq!(r.jt.abs(), mat.mu_k * r.jn.abs(), epsilon = 1e-12);
        // Friction opposes the tangential contact velocity.
        let vt = body.velocity.dot(floor_normal().perp());
        assert!(r.jt * vt < 0.0);
        assert!(r.dissipated > 0.0);
    }

    #[test]
    fn offset_contact_spins_the_body() {
        // Contact off the center line converts some impulse into spin.
        let body = ContactBody {
            mass: 1.0,
            inertia: 0.02,
            center: DVec2::new(0.0, 0.1),
            velocity: DVec2::new(1.0, -3.0),
            omega: 0.0,
        };
        let mat = Material::new(0.5, 0.6, 0.5);
        let r = resolve_contact(
            &body,
            DVec2::new(0.0, 0.0),
            floor_normal(),
            &mat,
            &Tolerances::default(),
        )
        .unwrap();

        assert!(r.omega != 0.0);
        assert!(r.dissipated >= 0.0);
    }
}
