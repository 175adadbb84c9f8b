//! Scalar root location for event predicates.
//!
//! Given a continuous g on [t0, t1] with a bracketed sign change, locates t*
//! with |g(t*)| within tolerance. Three algorithms are available, selected
//! automatically by interval width:
//!
//! - **Bisection** for narrow intervals (< 0.1): linear but unconditional.
//! - **Secant** for moderate intervals (0.1 ..= 1.0): superlinear, with a
//!   divided-difference guard.
//! - **Brent** for wide intervals (> 1.0): inverse-quadratic interpolation
//!   with bisection safeguards, the most robust default.

use thiserror::Error;

const BISECTION_MAX_ITER: usize = 100;
const SECANT_MAX_ITER: usize = 50;
const BRENT_MAX_ITER: usize = 100;
/// Divided-difference guard for the secant update.
const SECANT_GUARD: f64 = 1e-14;

/// Root-location algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootMethod {
    Bisection,
    Secant,
    Brent,
}

impl RootMethod {
    /// Width-based automatic selection.
    pub fn for_width(width: f64) -> Self {
        if width < 0.1 {
            RootMethod::Bisection
        } else if width <= 1.0 {
            RootMethod::Secant
        } else {
            RootMethod::Brent
        }
    }
}

/// Outcome of a root search.
#[derive(Debug, Clone, Copy)]
pub struct RootResult {
    /// Located time.
    pub t: f64,
    /// Iterations consumed.
    pub iterations: usize,
    /// Whether |g(t)| reached the tolerance within the iteration cap.
    pub converged: bool,
    /// Final |g(t)|.
    pub residual: f64,
    /// Algorithm that produced the result.
    pub method: RootMethod,
}

/// The endpoints do not bracket a sign change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no bracketed root: g has the same sign at both endpoints")]
pub struct NoBracket;

/// Locate a root of `g` on [t0, t1] with the width-selected algorithm.
pub fn find_root_auto<F: FnMut(f64) -> f64>(
    g: F,
    t0: f64,
    t1: f64,
    tol: f64,
) -> Result<RootResult, NoBracket> {
    find_root(g, t0, t1, tol, RootMethod::for_width(t1 - t0))
}

/// Locate a root of `g` on [t0, t1] with the given algorithm.
///
/// Requires g(t0) * g(t1) <= 0; a strictly positive product is reported as
/// [`NoBracket`] and the caller treats the predicate as not firing.
pub fn find_root<F: FnMut(f64) -> f64>(
    mut g: F,
    t0: f64,
    t1: f64,
    tol: f64,
    method: RootMethod,
) -> Result<RootResult, NoBracket> {
    let ga = g(t0);
    let gb = g(t1);
    if ga * gb > 0.0 {
        return Err(NoBracket);
    }
    if ga.abs() <= tol {
        return Ok(RootResult {
            t: t0,
            iterations: 0,
            converged: true,
            residual: ga.abs(),
            method,
        });
    }
    if gb.abs() <= tol {
        return Ok(RootResult {
            t: t1,
            iterations: 0,
            converged: true,
            residual: gb.abs(),
            method,
        });
    }

    Ok(match method {
        RootMethod::Bisection => bisection(g, t0, ga, t1, gb, tol),
        RootMethod::Secant => secant(g, t0, ga, t1, gb, tol),
        RootMethod::Brent => brent(g, t0, ga, t1, gb, tol),
    })
}

fn bisection<F: FnMut(f64) -> f64>(
    mut g: F,
    mut a: f64,
    mut ga: f64,
    mut b: f64,
    _gb: f64,
    tol: f64,
) -> RootResult {
    for i in 0..BISECTION_MAX_ITER {
        let mid = 0.5 * (a + b);
        if mid == a || mid == b {
            // Interval exhausted at floating resolution.
            return RootResult {
                t: mid,
                iterations: i,
                converged: true,
                residual: g(mid).abs(),
                method: RootMethod::Bisection,
            };
        }
        let gm = g(mid);
        if gm.abs() <= tol {
            return RootResult {
                t: mid,
                iterations: i + 1,
                converged: true,
                residual: gm.abs(),
                method: RootMethod::Bisection,
            };
        }
        if ga * gm <= 0.0 {
            b = mid;
        } else {
            a = mid;
            ga = gm;
        }
    }
    let mid = 0.5 * (a + b);
    RootResult {
        t: mid,
        iterations: BISECTION_MAX_ITER,
        converged: false,
        residual: g(mid).abs(),
        method: RootMethod::Bisection,
    }
}

fn secant<F: FnMut(f64) -> f64>(
    mut g: F,
    t0: f64,
    g0: f64,
    t1: f64,
    g1: f64,
    tol: f64,
) -> RootResult {
    let (mut x_prev, mut f_prev) = (t0, g0);
    let (mut x, mut f) = (t1, g1);
    let (lo, hi) = (t0.min(t1), t0.max(t1));

    for i in 0..SECANT_MAX_ITER {
        let df = f - f_prev;
        if df.abs() < SECANT_GUARD {
            return RootResult {
                t: x,
                iterations: i,
                converged: false,
                residual: f.abs(),
                method: RootMethod::Secant,
            };
        }
        let x_next = (x - f * (x - x_prev) / df).clamp(lo, hi);
        let f_next = g(x_next);
        x_prev = x;
        f_prev = f;
        x = x_next;
        f = f_next;
        if f.abs() <= tol {
            return RootResult {
                t: x,
                iterations: i + 1,
                converged: true,
                residual: f.abs(),
                method: RootMethod::Secant,
            };
        }
    }
    RootResult {
        t: x,
        iterations: SECANT_MAX_ITER,
        converged: false,
        residual: f.abs(),
        method: RootMethod::Secant,
    }
}

/// Brent's method: inverse-quadratic / secant interpolation, falling back to
/// bisection when the candidate leaves (3a + b)/4 .. b or the previous two
/// steps were too small relative to the tolerance.
fn brent<F: FnMut(f64) -> f64>(
    mut g: F,
    mut a: f64,
    mut fa: f64,
    mut b: f64,
    mut fb: f64,
    tol: f64,
) -> RootResult {
    // Keep b the best (smallest-|g|) endpoint.
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut bisected = true;

    for i in 0..BRENT_MAX_ITER {
        if fb.abs() <= tol {
            return RootResult {
                t: b,
                iterations: i,
                converged: true,
                residual: fb.abs(),
                method: RootMethod::Brent,
            };
        }

        let mut s = if fa != fc && fb != fc {
            // Inverse quadratic interpolation.
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fa * fc / ((fb - fa) * (fb - fc))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            // Secant fallback.
            b - fb * (b - a) / (fb - fa)
        };

        let lo = (3.0 * a + b) / 4.0;
        let (lo, hi) = (lo.min(b), lo.max(b));
        let step_small = if bisected {
            (b - c).abs() < tol
        } else {
            (c - d).abs() < tol
        };
        if s < lo || s > hi || step_small {
            s = 0.5 * (a + b);
            bisected = true;
        } else {
            bisected = false;
        }

        let fs = g(s);
        d = c;
        c = b;
        fc = fb;
        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }
        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    RootResult {
        t: b,
        iterations: BRENT_MAX_ITER,
        converged: false,
        residual: fb.abs(),
        method: RootMethod::Brent,
    }
}
