//! Event predicates and their declared actions.

use glam::DVec2;

use crate::world::{Scene, Shape, Surface};

/// A scalar event predicate g(t; q, v) whose sign change marks an event.
///
/// Like the derivative function, predicates are compiled upstream and
/// consumed as opaque callables.
pub trait EventFn {
    fn eval(&self, t: f64, q: &[f64], v: &[f64]) -> f64;
}

impl<F> EventFn for F
where
    F: Fn(f64, &[f64], &[f64]) -> f64,
{
    fn eval(&self, t: f64, q: &[f64], v: &[f64]) -> f64 {
        self(t, q, v)
    }
}

/// What the driver does when a predicate fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    /// Resolve a contact impulse between the indexed body and surface.
    ResolveContact { body: usize, surface: usize },
    /// Record a phase-switch marker; state is not mutated.
    SwitchPhase { payload: String },
    /// End the simulation at the event time.
    Stop,
    /// Record a caller-defined marker; state is not mutated.
    Custom { payload: String },
}

/// A declared event: id, predicate, action.
pub struct EventSpec {
    pub id: String,
    pub action: EventAction,
    predicate: Box<dyn EventFn>,
}

impl EventSpec {
    pub fn new(
        id: impl Into<String>,
        action: EventAction,
        predicate: impl EventFn + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            action,
            predicate: Box::new(predicate),
        }
    }

    /// Contact event between a body and a surface, with the signed-clearance
    /// predicate compiled from the scene geometry.
    pub fn contact(id: impl Into<String>, body: usize, surface: usize, scene: &Scene) -> Self {
        let shape = scene.bodies[body].shape;
        let surf = scene.surfaces[surface].clone();
        let predicate = clearance_predicate(shape, surf, body);
        Self::new(id, EventAction::ResolveContact { body, surface }, predicate)
    }

    #[inline]
    pub fn eval(&self, t: f64, q: &[f64], v: &[f64]) -> f64 {
        self.predicate.eval(t, q, v)
    }
}

impl std::fmt::Debug for EventSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSpec")
            .field("id", &self.id)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Signed clearance of `body`'s shape above the surface, read from the
/// packed state.
fn clearance_predicate(
    shape: Shape,
    surface: Surface,
    body: usize,
) -> impl Fn(f64, &[f64], &[f64]) -> f64 {
    move |_t, q, _v| {
        let k = 3 * body;
        let center = DVec2::new(q[k], q[k + 1]);
        surface.signed_clearance(&shape, center, q[k + 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Body, World};
    use approx::assert_relative_eq;

    #[test]
    fn contact_predicate_reads_the_packed_pose() {
        let scene = Scene::new(World::y_up_standard())
            .body(Body::new("ball", Shape::Circle { radius: 0.1 }, 1.0).at(0.0, 5.0))
            .surface(Surface::new("floor", DVec2::ZERO, DVec2::new(0.0, 1.0)));
        let ev = EventSpec::contact("contact_1", 0, 0, &scene);

        let state = scene.initial_state();
        assert_relative_eq!(ev.eval(0.0, &state.q, &state.v), 4.9);

        let mut low = state.clone();
        low.q[1] = 0.05;
        assert_relative_eq!(ev.eval(0.0, &low.q, &low.v), -0.05);
    }

    #[test]
    fn closure_predicates_work() {
        let ev = EventSpec::new(
            "vy_zero",
            EventAction::SwitchPhase { payload: "apex".into() },
            |_t: f64, _q: &[f64], v: &[f64]| v[1],
        );
        assert_eq!(ev.eval(0.0, &[0.0; 3], &[0.0, 3.0, 0.0]), 3.0);
    }
}
