//! Acceptance runner: executes declared assertions against a finished trace
//! and aggregates a pass/fail result with a score.
//!
//! Four assertion kinds are supported: event-time windows, conservation
//! drift bounds, trajectory/velocity shape fits, and ratio expressions over
//! named trace quantities. The runner never panics on bad inputs: an
//! assertion that cannot be evaluated records a hard error and the rest
//! continue.

pub mod quantity;
pub mod shape;

pub use quantity::{eval_expr, quantity_table, ExprError};
pub use shape::{ShapeError, ShapeFit, ShapePattern};

use std::collections::BTreeMap;

use log::warn;

use crate::energy::{angular_momentum, linear_momentum};
use crate::error::Warning;
use crate::sim::{Sample, Tolerances, Trace};
use crate::state::SimState;
use crate::world::Scene;

/// Conserved quantity named by a conservation assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConservedQuantity {
    Energy,
    Momentum,
    AngularMomentum,
}

/// Which time series a shape assertion fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeriesSource {
    Trajectory,
    Velocity,
}

/// Component of the series; vertical motion is what contracts usually test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    X,
    #[default]
    Y,
}

/// A declared acceptance assertion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Assertion {
    /// The first event with the given id must fall inside [lo, hi].
    EventTime {
        id: String,
        event: String,
        window: (f64, f64),
    },
    /// Relative drift of the quantity from first to last sample must stay
    /// within the declared bound.
    Conservation {
        id: String,
        quantity: ConservedQuantity,
        drift: f64,
    },
    /// Least-squares fit of the named series must reach r2_min.
    Shape {
        id: String,
        of: SeriesSource,
        pattern: ShapePattern,
        /// Body id; `None` = first declared body.
        body: Option<String>,
        axis: Axis,
        /// `None` falls back to the contract's r2_min tolerance.
        r2_min: Option<f64>,
    },
    /// Expression over named quantities, normalized so equality yields 1.
    Ratio {
        id: String,
        expr: String,
        /// `None` falls back to the contract's rel_err tolerance.
        tol: Option<f64>,
    },
}

impl Assertion {
    pub fn event_time(id: impl Into<String>, event: impl Into<String>, lo: f64, hi: f64) -> Self {
        Assertion::EventTime {
            id: id.into(),
            event: event.into(),
            window: (lo, hi),
        }
    }

    pub fn conservation(id: impl Into<String>, quantity: ConservedQuantity, drift: f64) -> Self {
        Assertion::Conservation {
            id: id.into(),
            quantity,
            drift,
        }
    }

    pub fn shape(id: impl Into<String>, of: SeriesSource, pattern: ShapePattern) -> Self {
        Assertion::Shape {
            id: id.into(),
            of,
            pattern,
            body: None,
            axis: Axis::default(),
            r2_min: None,
        }
    }

    pub fn ratio(id: impl Into<String>, expr: impl Into<String>) -> Self {
        Assertion::Ratio {
            id: id.into(),
            expr: expr.into(),
            tol: None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Assertion::EventTime { .. } => "event_time",
            Assertion::Conservation { .. } => "conservation",
            Assertion::Shape { .. } => "shape",
            Assertion::Ratio { .. } => "ratio",
        }
    }

    fn id(&self) -> &str {
        match self {
            Assertion::EventTime { id, .. }
            | Assertion::Conservation { id, .. }
            | Assertion::Shape { id, .. }
            | Assertion::Ratio { id, .. } => id,
        }
    }
}

/// Per-assertion result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssertionOutcome {
    pub id: String,
    pub kind: String,
    pub passed: bool,
    /// The assertion could not be evaluated (missing data); score is zero
    /// and overall success is denied regardless of pass rate.
    pub hard_error: bool,
    pub score: f64,
    pub actual: Option<f64>,
    pub expected: Option<f64>,
    pub tolerance: f64,
    pub error: f64,
    pub message: String,
    pub detail: BTreeMap<String, String>,
}

/// Aggregate counts over all assertions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub average_score: f64,
}

/// The acceptance verdict for one trace.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Report {
    /// Pass rate >= 0.8 and no hard errors.
    pub success: bool,
    pub overall_score: f64,
    pub assertions: Vec<AssertionOutcome>,
    pub summary: Summary,
    pub warnings: Vec<String>,
}

/// Execute every assertion against the trace and aggregate.
pub fn run_acceptance(
    scene: &Scene,
    trace: &Trace,
    assertions: &[Assertion],
    tol: &Tolerances,
) -> Report {
    let mut warnings = Vec::new();
    if assertions.is_empty() {
        let w = Warning::NoAssertions;
        warn!("{w}");
        warnings.push(w.to_string());
        return Report {
            success: true,
            overall_score: 1.0,
            assertions: Vec::new(),
            summary: Summary {
                total: 0,
                passed: 0,
                failed: 0,
                pass_rate: 1.0,
                average_score: 1.0,
            },
            warnings,
        };
    }

    let table = quantity_table(scene, trace);
    let outcomes: Vec<AssertionOutcome> = assertions
        .iter()
        .map(|a| run_one(scene, trace, a, tol, &table))
        .collect();

    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| o.passed).count();
    let hard_errors = outcomes.iter().filter(|o| o.hard_error).count();
    let pass_rate = passed as f64 / total as f64;
    let average_score = outcomes.iter().map(|o| o.score).sum::<f64>() / total as f64;

    Report {
        success: pass_rate >= 0.8 && hard_errors == 0,
        overall_score: average_score,
        assertions: outcomes,
        summary: Summary {
            total,
            passed,
            failed: total - passed,
            pass_rate,
            average_score,
        },
        warnings,
    }
}

fn run_one(
    scene: &Scene,
    trace: &Trace,
    assertion: &Assertion,
    tol: &Tolerances,
    table: &BTreeMap<String, f64>,
) -> AssertionOutcome {
    let base = AssertionOutcome {
        id: assertion.id().to_string(),
        kind: assertion.kind().to_string(),
        passed: false,
        hard_error: false,
        score: 0.0,
        actual: None,
        expected: None,
        tolerance: 0.0,
        error: 0.0,
        message: String::new(),
        detail: BTreeMap::new(),
    };

    // A truncated trace means the inputs downstream assertions need are
    // missing; every assertion on it is a hard error.
    if trace.stats.truncated {
        return AssertionOutcome {
            hard_error: true,
            message: "trace truncated by an integrator failure; assertion inputs missing".into(),
            ..base
        };
    }

    match assertion {
        Assertion::EventTime { event, window, .. } => {
            run_event_time(trace, event, *window, tol, base)
        }
        Assertion::Conservation {
            quantity, drift, ..
        } => run_conservation(scene, trace, *quantity, *drift, base),
        Assertion::Shape {
            of,
            pattern,
            body,
            axis,
            r2_min,
            ..
        } => run_shape(
            scene,
            trace,
            *of,
            *pattern,
            body.as_deref(),
            *axis,
            r2_min.unwrap_or(tol.r2_min),
            base,
        ),
        Assertion::Ratio { expr, tol: rt, .. } => {
            run_ratio(expr, rt.unwrap_or(tol.rel_err), table, base)
        }
    }
}

fn run_event_time(
    trace: &Trace,
    event: &str,
    (lo, hi): (f64, f64),
    tol: &Tolerances,
    mut out: AssertionOutcome,
) -> AssertionOutcome {
    out.expected = Some(0.5 * (lo + hi));
    out.tolerance = 0.5 * (hi - lo);

    let Some(record) = trace.first_event(event) else {
        out.message = format!("no event named `{event}` was recorded");
        return out;
    };
    let t = record.t;
    out.actual = Some(t);

    let width = hi - lo;
    let signed = if width > 0.0 {
        if t < lo {
            (t - lo) / width
        } else if t > hi {
            (t - hi) / width
        } else {
            0.0
        }
    } else {
        // Degenerate window: compare against the single admissible time.
        t - lo
    };
    out.error = signed;
    let magnitude = signed.abs();
    out.passed = if width > 0.0 {
        magnitude == 0.0
    } else {
        magnitude <= tol.event_time_sec
    };
    out.score = (1.0 - magnitude).max(0.0);
    out.message = if out.passed {
        format!("event `{event}` at t = {t:.6} inside [{lo}, {hi}]")
    } else {
        format!("event `{event}` at t = {t:.6} outside [{lo}, {hi}]")
    };
    out
}

fn sample_state(sample: &Sample) -> SimState {
    let mut s = SimState::zeros(3 * sample.bodies.len());
    for (i, b) in sample.bodies.iter().enumerate() {
        let k = 3 * i;
        s.q[k] = b.x;
        s.q[k + 1] = b.y;
        s.q[k + 2] = b.theta;
        s.v[k] = b.vx;
        s.v[k + 1] = b.vy;
        s.v[k + 2] = b.omega;
    }
    s.t = sample.t;
    s
}

fn run_conservation(
    scene: &Scene,
    trace: &Trace,
    quantity: ConservedQuantity,
    bound: f64,
    mut out: AssertionOutcome,
) -> AssertionOutcome {
    if trace.samples.len() < 2 {
        out.hard_error = true;
        out.message = "conservation needs at least two samples".into();
        return out;
    }
    let first = &trace.samples[0];
    let last = &trace.samples[trace.samples.len() - 1];

    let (initial, final_, label) = match quantity {
        ConservedQuantity::Energy => (first.energy.total, last.energy.total, "mechanical energy"),
        ConservedQuantity::Momentum => {
            let p0 = linear_momentum(scene, &sample_state(first)).length();
            let p1 = linear_momentum(scene, &sample_state(last)).length();
            (p0, p1, "linear momentum magnitude")
        }
        ConservedQuantity::AngularMomentum => {
            let l0 = angular_momentum(scene, &sample_state(first));
            let l1 = angular_momentum(scene, &sample_state(last));
            (l0, l1, "angular momentum")
        }
    };

    let denom = match quantity {
        ConservedQuantity::Energy => initial.abs().max(1e-12),
        _ => initial.abs().max(1e-9),
    };
    let drift = (final_ - initial).abs() / denom;

    out.actual = Some(final_);
    out.expected = Some(initial);
    out.tolerance = bound;
    out.error = drift;
    out.passed = drift <= bound;
    out.score = (1.0 - drift / bound.max(1e-12)).max(0.0);
    out.detail.insert("quantity".into(), label.to_string());
    out.message = format!(
        "{label} drift {:.3e} vs bound {:.3e} ({} -> {})",
        drift, bound, initial, final_
    );
    out
}

#[allow(clippy::too_many_arguments)]
fn run_shape(
    scene: &Scene,
    trace: &Trace,
    of: SeriesSource,
    pattern: ShapePattern,
    body: Option<&str>,
    axis: Axis,
    r2_min: f64,
    mut out: AssertionOutcome,
) -> AssertionOutcome {
    let index = match body {
        Some(id) => match scene.body_index(id) {
            Some(i) => i,
            None => {
                out.hard_error = true;
                out.message = format!("shape assertion references unknown body `{id}`");
                return out;
            }
        },
        None => {
            if scene.bodies.is_empty() {
                out.hard_error = true;
                out.message = "shape assertion on a scene with no bodies".into();
                return out;
            }
            0
        }
    };

    let ts: Vec<f64> = trace.samples.iter().map(|s| s.t).collect();
    let ys: Vec<f64> = trace
        .samples
        .iter()
        .map(|s| {
            let b = &s.bodies[index];
            match (of, axis) {
                (SeriesSource::Trajectory, Axis::X) => b.x,
                (SeriesSource::Trajectory, Axis::Y) => b.y,
                (SeriesSource::Velocity, Axis::X) => b.vx,
                (SeriesSource::Velocity, Axis::Y) => b.vy,
            }
        })
        .collect();

    match shape::fit_pattern(pattern, &ts, &ys) {
        Err(e) => {
            // Every fit error means the assertion could not be evaluated.
            out.hard_error = matches!(
                e,
                ShapeError::TooFewSamples(_)
                    | ShapeError::MixedSignSeries
                    | ShapeError::SingularFit
            );
            out.message = e.to_string();
            out
        }
        Ok(fit) => {
            out.actual = Some(fit.score);
            out.expected = Some(r2_min);
            out.tolerance = r2_min;
            out.error = (r2_min - fit.score).max(0.0);
            out.passed = fit.score >= r2_min;
            out.score = fit.score;
            out.detail.insert("fit".into(), fit.detail);
            out.message = format!(
                "{pattern:?} fit scored {:.4} against minimum {:.4}",
                fit.score, r2_min
            );
            out
        }
    }
}

fn run_ratio(
    expr: &str,
    tol: f64,
    table: &BTreeMap<String, f64>,
    mut out: AssertionOutcome,
) -> AssertionOutcome {
    out.expected = Some(1.0);
    out.tolerance = tol;
    match eval_expr(expr, table) {
        Err(e) => {
            out.hard_error = true;
            out.message = format!("ratio `{expr}`: {e}");
            out
        }
        Ok(value) => {
            let error = (value - 1.0).abs();
            out.actual = Some(value);
            out.error = error;
            out.passed = error <= tol;
            out.score = (1.0 - error / tol.max(1e-12)).max(0.0);
            out.message = format!("`{expr}` = {value:.6} (|deviation| = {error:.3e}, tol = {tol})");
            out
        }
    }
}
