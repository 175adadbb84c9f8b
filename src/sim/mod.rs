//! The simulator driver: owns the time loop, the trace, and event dispatch.
//!
//! For each attempted step the driver scans every declared predicate over
//! the step interval, refines the earliest bracketed sign change with the
//! root finder, integrates exactly to the crossing, applies the declared
//! action, and resamples. Ordinary steps are accepted or rejected by the
//! integrator and adjust the step size.

mod event;
mod trace;

pub use event::{EventAction, EventFn, EventSpec};
pub use trace::{BodySample, EventInfo, EventRecord, Sample, SimResult, SimStats, Trace};

use std::time::Instant;

use log::{debug, warn};

use crate::contact::{self, ContactBody, ContactWarning};
use crate::energy::energy_of;
use crate::error::{ConfigError, ContactError, SimError, Warning};
use crate::solver::{rootfind, Rk4, Rk45, SolverKind, StepControl};
use crate::state::SimState;
use crate::world::{Dynamics, Scene};

/// Contract tolerances consumed by the driver and the acceptance runner.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    /// Minimum R^2 for shape assertions.
    pub r2_min: f64,
    /// Default relative tolerance for ratio assertions.
    pub rel_err: f64,
    /// Event time tolerance, also the grazing-zero gate for predicates.
    pub event_time_sec: f64,
    /// Relative energy drift bound for conservative contracts.
    pub energy_drift_rel: f64,
    /// Small-velocity tolerance for the stick/slip discriminator.
    pub v_eps: f64,
    /// Impulse magnitude below which a contact is flagged as noise.
    pub impulse_min: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            r2_min: 0.9,
            rel_err: 0.02,
            event_time_sec: 1e-8,
            energy_drift_rel: 0.02,
            v_eps: 1e-3,
            impulse_min: 1e-9,
        }
    }
}

/// Frozen per-run configuration, captured by value at simulation start.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimOptions {
    pub solver: SolverKind,
    pub control: StepControl,
    /// Simulation horizon in seconds.
    pub t_end: f64,
    pub tolerances: Tolerances,
}

impl SimOptions {
    pub fn new(solver: SolverKind, t_end: f64) -> Self {
        Self {
            solver,
            control: StepControl::default(),
            t_end,
            tolerances: Tolerances::default(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.control.validate()?;
        if !self.t_end.is_finite() || self.t_end < 0.0 {
            return Err(ConfigError::InvalidDuration(self.t_end));
        }
        Ok(())
    }
}

fn validate_events(scene: &Scene, events: &[EventSpec]) -> Result<(), ConfigError> {
    for ev in events {
        if let EventAction::ResolveContact { body, surface } = ev.action {
            if body >= scene.bodies.len() {
                return Err(ConfigError::EventBodyOutOfRange {
                    id: ev.id.clone(),
                    index: body,
                    len: scene.bodies.len(),
                });
            }
            if surface >= scene.surfaces.len() {
                return Err(ConfigError::EventSurfaceOutOfRange {
                    id: ev.id.clone(),
                    index: surface,
                    len: scene.surfaces.len(),
                });
            }
        }
    }
    Ok(())
}

/// Run one simulation to completion.
///
/// Config problems surface synchronously with no trace. Mid-run failures
/// truncate: the returned [`SimResult`] carries the partial trace, the
/// accumulated warnings, and the fatal error.
pub fn simulate(
    scene: &Scene,
    dynamics: &dyn Dynamics,
    events: &[EventSpec],
    options: &SimOptions,
) -> Result<SimResult, ConfigError> {
    scene.validate()?;
    options.validate()?;
    validate_events(scene, events)?;

    let start = Instant::now();
    let ctrl = options.control;
    let tol = options.tolerances;
    let t_end = options.t_end;

    let mut state = scene.initial_state();
    let mut trace = Trace::default();
    let mut warnings: Vec<Warning> = Vec::new();
    let mut fatal: Option<SimError> = None;
    let mut h = ctrl.h0;

    push_sample(&mut trace.samples, scene, &state);

    if scene.bodies.is_empty() || t_end <= 0.0 {
        trace.stats.sample_count = trace.samples.len();
        trace.stats.event_count = trace.events.len();
        trace.stats.final_h = h;
        trace.stats.cpu_ms = start.elapsed().as_secs_f64() * 1e3;
        return Ok(SimResult {
            trace,
            warnings,
            fatal: None,
        });
    }

    let dof = scene.dof();
    let mut rk4 = Rk4::new(dof);
    let mut rk45 = Rk45::new(dof);
    let mut probe_rk4 = Rk4::new(dof);
    let mut trial = state.clone();
    let mut probe = state.clone();

    'main: while state.t < t_end - 1e-12 {
        let remaining = t_end - state.t;
        let mut h_attempt = h.min(remaining);

        // ---- trial step over [t, t + h] ----
        trial.copy_from(&state);
        let mut h_next = h;
        let step_res = match options.solver {
            SolverKind::Rk4 => {
                let r = rk4.step(dynamics, &mut trial, h_attempt);
                if r.is_ok() {
                    h_next = (h * 1.01).min(ctrl.h_max);
                }
                r
            }
            SolverKind::Rk45 => loop {
                match rk45.try_step(dynamics, &mut trial, h_attempt, ctrl.tol) {
                    Err(e) => break Err(e),
                    Ok(out) if out.accepted => {
                        h_next = out.h_next.clamp(ctrl.h_min, ctrl.h_max);
                        break Ok(());
                    }
                    Ok(_) => {
                        trace.stats.rejects += 1;
                        if h_attempt <= ctrl.h_min * (1.0 + 1e-12) {
                            break Err(SimError::StepTooSmall { t: state.t });
                        }
                        let halved = (0.5 * h_attempt).max(ctrl.h_min);
                        if halved <= ctrl.h_min * (1.0 + 1e-12) {
                            let w = Warning::StepFloor {
                                t: state.t,
                                h_min: ctrl.h_min,
                            };
                            warn!("{w}");
                            warnings.push(w);
                        }
                        h_attempt = halved;
                    }
                }
            },
        };
        if let Err(e) = step_res {
            trace.stats.truncated = true;
            fatal = Some(e);
            break 'main;
        }
        let t_hi = trial.t;

        // ---- event scan over [t, t_hi] ----
        let mut hit: Option<(usize, f64, f64)> = None;
        for (idx, ev) in events.iter().enumerate() {
            let ga = ev.eval(state.t, &state.q, &state.v);
            let gb = ev.eval(t_hi, &trial.q, &trial.v);
            // A left endpoint already at zero is a grazing contact being
            // coalesced, not a fresh crossing.
            if ga * gb > 0.0 || ga.abs() <= tol.event_time_sec {
                continue;
            }
            let root = rootfind::find_root_auto(
                |tau| {
                    probe.copy_from(&state);
                    if tau > probe.t
                        && probe_rk4
                            .integrate_to(dynamics, &mut probe, tau, ctrl.h0)
                            .is_err()
                    {
                        return f64::NAN;
                    }
                    ev.eval(tau, &probe.q, &probe.v)
                },
                state.t,
                t_hi,
                tol.event_time_sec,
            );
            let (t_star, residual) = match root {
                Err(rootfind::NoBracket) => continue,
                Ok(r) if r.converged => (r.t, r.residual),
                Ok(r) => {
                    let mid = 0.5 * (state.t + t_hi);
                    let w = Warning::RootNoConvergence {
                        id: ev.id.clone(),
                        t: mid,
                    };
                    warn!("{w}");
                    warnings.push(w);
                    (mid, r.residual)
                }
            };
            // Earliest crossing wins; near-simultaneous crossings go to the
            // smaller |g|, then to declaration order.
            let replace = match hit {
                None => true,
                Some((_, best_t, best_res)) => {
                    t_star < best_t - tol.event_time_sec
                        || ((t_star - best_t).abs() <= tol.event_time_sec && residual < best_res)
                }
            };
            if replace {
                hit = Some((idx, t_star, residual));
            }
        }

        if let Some((idx, t_star, _)) = hit {
            // ---- integrate exactly to the crossing and apply the action ----
            let t_star = t_star.max(state.t);
            let land_res = match options.solver {
                SolverKind::Rk4 => rk4.integrate_to(dynamics, &mut state, t_star, ctrl.h0),
                SolverKind::Rk45 => {
                    let dt = t_star - state.t;
                    rk45.integrate_to(dynamics, &mut state, t_star, h.min(dt.max(ctrl.h_min)), &ctrl)
                }
            };
            if let Err(e) = land_res {
                trace.stats.truncated = true;
                fatal = Some(e);
                break 'main;
            }

            let ev = &events[idx];
            debug!("event `{}` fires at t = {t_star}", ev.id);
            let mut stop = false;
            let info = match &ev.action {
                EventAction::ResolveContact { body, surface } => {
                    match apply_contact(scene, &mut state, *body, *surface, &tol) {
                        Ok((info, contact_warnings)) => {
                            for cw in contact_warnings {
                                let w = match cw {
                                    ContactWarning::ConeViolation { jt, cone } => {
                                        Warning::FrictionCone { t: t_star, jt, cone }
                                    }
                                    ContactWarning::BelowImpulseFloor { impulse, floor } => {
                                        Warning::ImpulseBelowFloor {
                                            t: t_star,
                                            impulse,
                                            floor,
                                        }
                                    }
                                };
                                warn!("{w}");
                                warnings.push(w);
                            }
                            info
                        }
                        Err(e) => {
                            trace.stats.truncated = true;
                            fatal = Some(SimError::Contact {
                                t: t_star,
                                source: e,
                            });
                            break 'main;
                        }
                    }
                }
                EventAction::SwitchPhase { payload } => EventInfo::Phase {
                    payload: payload.clone(),
                },
                EventAction::Stop => {
                    stop = true;
                    EventInfo::Stop
                }
                EventAction::Custom { payload } => EventInfo::Custom {
                    payload: payload.clone(),
                },
            };
            trace.events.push(EventRecord {
                id: ev.id.clone(),
                t: t_star,
                info,
            });
            push_sample(&mut trace.samples, scene, &state);
            if stop {
                break 'main;
            }
            continue 'main;
        }

        // ---- ordinary accepted step ----
        state.copy_from(&trial);
        trace.stats.steps += 1;
        h = h_next.clamp(ctrl.h_min, ctrl.h_max);
        push_sample(&mut trace.samples, scene, &state);
    }

    trace.stats.sample_count = trace.samples.len();
    trace.stats.event_count = trace.events.len();
    trace.stats.final_h = h;
    trace.stats.cpu_ms = start.elapsed().as_secs_f64() * 1e3;
    Ok(SimResult {
        trace,
        warnings,
        fatal,
    })
}

fn apply_contact(
    scene: &Scene,
    state: &mut SimState,
    body_idx: usize,
    surface_idx: usize,
    tol: &Tolerances,
) -> Result<(EventInfo, Vec<ContactWarning>), ContactError> {
    let body = &scene.bodies[body_idx];
    let surf = &scene.surfaces[surface_idx];
    let bs = state.body(body_idx);

    let n = surf.unit_normal();
    let contact_point = body.shape.support(bs.position(), bs.theta, -n);
    // The surface's declared material governs the contact; absent that, the
    // body's own material.
    let material = surf.material.unwrap_or(body.material);

    let cb = ContactBody {
        mass: body.mass,
        inertia: body.inertia(),
        center: bs.position(),
        velocity: bs.velocity(),
        omega: bs.omega,
    };
    let res = contact::resolve_contact(&cb, contact_point, n, &material, tol)?;
    state.set_body_velocity(body_idx, res.velocity, res.omega);

    Ok((
        EventInfo::Contact {
            impulse: res.impulse,
            jn: res.jn,
            jt: res.jt,
            regime: res.regime,
            dissipated: res.dissipated,
        },
        res.warnings,
    ))
}

/// Append a sample, nudging the recorded time by one ULP when an event fired
/// at exactly the previous sample time so sample times stay strictly
/// increasing.
fn push_sample(samples: &mut Vec<Sample>, scene: &Scene, state: &SimState) {
    let mut t = state.t;
    if let Some(last) = samples.last() {
        if t <= last.t {
            t = next_up(last.t);
        }
    }
    let bodies = (0..scene.bodies.len())
        .map(|i| {
            let b = state.body(i);
            BodySample {
                x: b.x,
                y: b.y,
                theta: b.theta,
                vx: b.vx,
                vy: b.vy,
                omega: b.omega,
            }
        })
        .collect();
    samples.push(Sample {
        t,
        bodies,
        energy: energy_of(scene, state),
    });
}

fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    let bits = if x == 0.0 {
        1
    } else if x > 0.0 {
        x.to_bits() + 1
    } else {
        x.to_bits() - 1
    };
    f64::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Body, Material, Shape, Surface, UniformGravity, World};
    use glam::DVec2;

    fn free_fall_scene() -> Scene {
        Scene::new(World::y_up_standard())
            .body(Body::new("ball", Shape::Circle { radius: 0.1 }, 1.0).at(0.0, 5.0))
    }

    #[test]
    fn zero_body_contract_yields_a_single_sample() {
        let scene = Scene::new(World::y_up_standard());
        let g = UniformGravity::from_scene(&scene);
        let result = simulate(&scene, &g, &[], &SimOptions::new(SolverKind::Rk4, 1.0)).unwrap();
        assert_eq!(result.trace.samples.len(), 1);
        assert_eq!(result.trace.samples[0].t, 0.0);
        assert!(result.trace.events.is_empty());
        assert_eq!(result.trace.stats.steps, 0);
        assert_eq!(result.trace.stats.sample_count, 1);
        assert_eq!(result.trace.stats.event_count, 0);
    }

    #[test]
    fn sample_times_are_strictly_increasing() {
        let scene = free_fall_scene();
        let g = UniformGravity::from_scene(&scene);
        let result = simulate(&scene, &g, &[], &SimOptions::new(SolverKind::Rk4, 1.0)).unwrap();
        assert!(result.completed());
        for pair in result.trace.samples.windows(2) {
            assert!(pair[1].t > pair[0].t);
        }
        assert!((result.trace.end_time().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn identical_contracts_give_bit_identical_traces() {
        let scene = free_fall_scene();
        let g = UniformGravity::from_scene(&scene);
        let opts = SimOptions::new(SolverKind::Rk45, 1.0);
        let a = simulate(&scene, &g, &[], &opts).unwrap();
        let b = simulate(&scene, &g, &[], &opts).unwrap();
        assert_eq!(a.trace.samples, b.trace.samples);
        assert_eq!(a.trace.events, b.trace.events);
    }

    #[test]
    fn stop_event_ends_the_run_early() {
        let scene = free_fall_scene();
        let g = UniformGravity::from_scene(&scene);
        // Stop when the ball has fallen one meter.
        let ev = EventSpec::new("fell_one_meter", EventAction::Stop, |_t: f64, q: &[f64], _v: &[f64]| {
            q[1] - 4.0
        });
        let result = simulate(&scene, &g, &[ev], &SimOptions::new(SolverKind::Rk4, 5.0)).unwrap();
        assert!(result.fatal.is_none());
        assert_eq!(result.trace.events.len(), 1);
        let e = &result.trace.events[0];
        assert_eq!(e.info, EventInfo::Stop);
        // 5 - 4.9 t^2 = 4  =>  t = sqrt(1 / 4.9)
        let expected = (1.0_f64 / 4.9).sqrt();
        assert!((e.t - expected).abs() < 1e-6, "stop at t = {}", e.t);
        assert!(result.trace.end_time().unwrap() < 5.0);
    }

    #[test]
    fn switch_phase_records_without_mutating_state() {
        let mut scene = free_fall_scene();
        scene.bodies[0].init.vy = 2.0;
        let g = UniformGravity::from_scene(&scene);
        // Apex: vertical velocity crosses zero.
        let ev = EventSpec::new(
            "apex",
            EventAction::SwitchPhase { payload: "descending".into() },
            |_t: f64, _q: &[f64], v: &[f64]| v[1],
        );
        let result = simulate(&scene, &g, &[ev], &SimOptions::new(SolverKind::Rk4, 1.0)).unwrap();
        let e = result.trace.first_event("apex").expect("apex event");
        assert!((e.t - 2.0 / 9.8).abs() < 1e-6);
        assert_eq!(
            e.info,
            EventInfo::Phase { payload: "descending".into() }
        );
        // The post-event sample continues the ballistic arc unperturbed.
        let last = result.trace.samples.last().unwrap();
        assert!((last.bodies[0].vy - (2.0 - 9.8)).abs() < 1e-6);
    }

    #[test]
    fn contact_event_reverses_an_elastic_drop() {
        let scene = free_fall_scene()
            .surface(Surface::new("floor", DVec2::ZERO, DVec2::new(0.0, 1.0)).material(Material::elastic()));
        let g = UniformGravity::from_scene(&scene);
        let ev = EventSpec::contact("contact_1", 0, 0, &scene);
        let result = simulate(&scene, &g, &[ev], &SimOptions::new(SolverKind::Rk4, 1.5)).unwrap();

        assert!(result.fatal.is_none());
        let e = result.trace.first_event("contact_1").expect("contact event");
        // Drop height 4.9 m: contact at t = 1.
        assert!((e.t - 1.0).abs() < 1e-6, "contact at t = {}", e.t);
        match &e.info {
            EventInfo::Contact { jn, dissipated, .. } => {
                assert!((jn - 2.0 * 9.8).abs() < 1e-3, "jn = {jn}");
                assert!(dissipated.abs() < 1e-6);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        // Post-event sample has the rebound velocity.
        let after = result
            .trace
            .samples
            .iter()
            .find(|s| s.t >= e.t)
            .unwrap();
        assert!((after.bodies[0].vy - 9.8).abs() < 1e-3);

        // Stats mirror the recorded trace.
        assert_eq!(result.trace.stats.sample_count, result.trace.samples.len());
        assert_eq!(result.trace.stats.event_count, result.trace.events.len());
    }

    #[test]
    fn invalid_step_control_is_a_config_error() {
        let scene = free_fall_scene();
        let g = UniformGravity::from_scene(&scene);
        let mut opts = SimOptions::new(SolverKind::Rk4, 1.0);
        opts.control.h_min = 1.0; // h_min > h0
        assert!(simulate(&scene, &g, &[], &opts).is_err());
    }

    #[test]
    fn event_index_out_of_range_is_a_config_error() {
        let scene = free_fall_scene();
        let g = UniformGravity::from_scene(&scene);
        let ev = EventSpec::new(
            "bad",
            EventAction::ResolveContact { body: 3, surface: 0 },
            |_t: f64, _q: &[f64], _v: &[f64]| 1.0,
        );
        let err = simulate(&scene, &g, &[ev], &SimOptions::new(SolverKind::Rk4, 1.0));
        assert!(matches!(err, Err(ConfigError::EventBodyOutOfRange { .. })));
    }

    #[test]
    fn diverging_dynamics_truncates_with_partial_trace() {
        let scene = free_fall_scene();
        let nan_after_half = |t: f64, _q: &[f64], v: &[f64], qd: &mut [f64], vd: &mut [f64]| {
            qd.copy_from_slice(v);
            let a = if t > 0.5 { f64::NAN } else { -9.8 };
            vd[0] = 0.0;
            vd[1] = a;
            vd[2] = 0.0;
        };
        let result = simulate(
            &scene,
            &nan_after_half,
            &[],
            &SimOptions::new(SolverKind::Rk4, 1.0),
        )
        .unwrap();
        assert!(result.trace.stats.truncated);
        assert!(matches!(result.fatal, Some(SimError::NonFiniteState { .. })));
        assert!(!result.trace.samples.is_empty());
        let last = result.trace.end_time().unwrap();
        assert!(last > 0.0 && last < 1.0);
    }
}
