//! # Kinetica -- Deterministic 2D Rigid-Body Simulation Core
//!
//! An event-driven simulation engine and acceptance validator for declarative
//! physics scenes: fixed and adaptive Runge-Kutta integration, precise event
//! location, impulse contact resolution with stick/slip friction, energy
//! bookkeeping, and a scoring runner that judges a finished trajectory
//! against declared assertions.
//!
//! ## Quick Start
//!
//! ```rust
//! use kinetica::prelude::*;
//! use glam::DVec2;
//!
//! // One ball dropped from 5 m onto an elastic floor.
//! let scene = Scene::new(World::y_up_standard())
//!     .body(Body::new("ball", Shape::Circle { radius: 0.1 }, 1.0).at(0.0, 5.0))
//!     .surface(Surface::new("floor", DVec2::ZERO, DVec2::new(0.0, 1.0)).material(Material::elastic()));
//!
//! let gravity = UniformGravity::from_scene(&scene);
//! let events = [EventSpec::contact("contact_1", 0, 0, &scene)];
//! let options = SimOptions::new(SolverKind::Rk4, 3.0);
//!
//! let result = simulate(&scene, &gravity, &events, &options).unwrap();
//! assert!(result.completed());
//!
//! let bounce = result.trace.first_event("contact_1").unwrap();
//! assert!((bounce.t - 1.0).abs() < 0.01);
//! ```
//!
//! ## Architecture
//!
//! - [`world`] -- Scene description: bodies, surfaces, materials, the
//!   [`Dynamics`](world::Dynamics) capability trait
//! - [`state`] -- Packed generalized state (q, v) over all bodies
//! - [`solver`] -- RK4 and Dormand-Prince RK45 steppers, event root-finding
//! - [`contact`] -- Single-point impulse resolution with restitution and
//!   stick/slip friction
//! - [`energy`] -- Kinetic/potential ledger, momentum totals
//! - [`sim`] -- The driver loop: event scan, refinement, action dispatch,
//!   sampling, step-size policy
//! - [`acceptance`] -- Assertion runner and trajectory scoring
//! - [`error`] -- Config errors, fatal simulation errors, warnings
//!
//! The core is single-threaded, synchronous, and deterministic: the same
//! contract always produces a bit-identical trace.

pub mod acceptance;
pub mod contact;
pub mod energy;
pub mod error;
pub mod sim;
pub mod solver;
pub mod state;
pub mod world;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::acceptance::{
        run_acceptance, Assertion, Axis, ConservedQuantity, Report, SeriesSource, ShapePattern,
    };
    pub use crate::contact::FrictionRegime;
    pub use crate::energy::EnergyBreakdown;
    pub use crate::error::{ConfigError, SimError, Warning};
    pub use crate::sim::{
        simulate, BodySample, EventAction, EventInfo, EventRecord, EventSpec, Sample, SimOptions,
        SimResult, SimStats, Tolerances, Trace,
    };
    pub use crate::solver::{SolverKind, StepControl};
    pub use crate::state::SimState;
    pub use crate::world::{
        Body, BodyKind, Material, Scene, Shape, Surface, UniformGravity, World, WorldFrame,
    };
}
