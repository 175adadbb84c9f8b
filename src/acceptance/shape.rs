//! Least-squares shape fits and structural pattern scores.
//!
//! Parametric patterns (linear, parabola, exponential, oscillating) are fit
//! by least squares and scored by R^2 against the original series.
//! Structural patterns (monotonic, single peak) report the fraction of
//! consecutive steps conforming to the pattern as their score.

use thiserror::Error;

/// Trajectory/velocity pattern named by a shape assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapePattern {
    Parabola,
    Monotonic,
    SinglePeak,
    Linear,
    Exponential,
    Oscillating,
}

/// Outcome of one fit: the score in [0, 1] plus a note about the model.
#[derive(Debug, Clone)]
pub struct ShapeFit {
    pub score: f64,
    pub detail: String,
}

/// The series cannot be fit at all (hard error at the assertion level).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("need at least 3 samples to fit a shape, got {0}")]
    TooFewSamples(usize),

    #[error("exponential fit requires a strictly same-sign series")]
    MixedSignSeries,

    #[error("normal equations are singular for this series")]
    SingularFit,
}

/// Fit `ys(ts)` to the named pattern.
pub fn fit_pattern(pattern: ShapePattern, ts: &[f64], ys: &[f64]) -> Result<ShapeFit, ShapeError> {
    if ts.len() < 3 || ts.len() != ys.len() {
        return Err(ShapeError::TooFewSamples(ts.len().min(ys.len())));
    }
    match pattern {
        ShapePattern::Linear => poly_fit(ts, ys, 1),
        ShapePattern::Parabola => poly_fit(ts, ys, 2),
        ShapePattern::Exponential => exponential_fit(ts, ys),
        ShapePattern::Oscillating => oscillating_fit(ts, ys),
        ShapePattern::Monotonic => Ok(monotonic_score(ys)),
        ShapePattern::SinglePeak => Ok(single_peak_score(ys)),
    }
}

/// Solve the normal equations for the given design columns by Gaussian
/// elimination with partial pivoting.
fn solve_normal_equations(cols: &[Vec<f64>], ys: &[f64]) -> Option<Vec<f64>> {
    let n = cols.len();
    let mut a = vec![vec![0.0; n + 1]; n];
    for j in 0..n {
        for k in 0..n {
            a[j][k] = cols[j].iter().zip(&cols[k]).map(|(x, y)| x * y).sum();
        }
        a[j][n] = cols[j].iter().zip(ys).map(|(x, y)| x * y).sum();
    }

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in 0..n {
            if row == col {
                continue;
            }
            let f = a[row][col] / a[col][col];
            for k in col..=n {
                a[row][k] -= f * a[col][k];
            }
        }
    }

    Some((0..n).map(|j| a[j][n] / a[j][j]).collect())
}

/// Coefficient of determination of `pred` against `ys`, clamped to [0, 1].
fn r_squared(ys: &[f64], pred: &[f64]) -> f64 {
    let n = ys.len() as f64;
    let mean = ys.iter().sum::<f64>() / n;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean) * (y - mean)).sum();
    let ss_res: f64 = ys.iter().zip(pred).map(|(y, p)| (y - p) * (y - p)).sum();
    if ss_tot < 1e-30 {
        return if ss_res < 1e-30 { 1.0 } else { 0.0 };
    }
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

fn poly_fit(ts: &[f64], ys: &[f64], degree: usize) -> Result<ShapeFit, ShapeError> {
    let cols: Vec<Vec<f64>> = (0..=degree)
        .map(|p| ts.iter().map(|t| t.powi(p as i32)).collect())
        .collect();
    let coeffs = solve_normal_equations(&cols, ys).ok_or(ShapeError::SingularFit)?;
    let pred: Vec<f64> = ts
        .iter()
        .map(|t| {
            coeffs
                .iter()
                .enumerate()
                .map(|(p, c)| c * t.powi(p as i32))
                .sum()
        })
        .collect();
    Ok(ShapeFit {
        score: r_squared(ys, &pred),
        detail: format!("degree-{degree} polynomial, coefficients {coeffs:?}"),
    })
}

fn exponential_fit(ts: &[f64], ys: &[f64]) -> Result<ShapeFit, ShapeError> {
    let sign = ys[0].signum();
    if sign == 0.0 || ys.iter().any(|y| y.signum() != sign || y.abs() < 1e-300) {
        return Err(ShapeError::MixedSignSeries);
    }
    let logs: Vec<f64> = ys.iter().map(|y| y.abs().ln()).collect();
    let cols: Vec<Vec<f64>> = vec![vec![1.0; ts.len()], ts.to_vec()];
    let coeffs = solve_normal_equations(&cols, &logs).ok_or(ShapeError::SingularFit)?;
    let pred: Vec<f64> = ts
        .iter()
        .map(|t| sign * (coeffs[0] + coeffs[1] * t).exp())
        .collect();
    Ok(ShapeFit {
        score: r_squared(ys, &pred),
        detail: format!(
            "y = {:.6e} * exp({:.6} t)",
            sign * coeffs[0].exp(),
            coeffs[1]
        ),
    })
}

fn oscillating_fit(ts: &[f64], ys: &[f64]) -> Result<ShapeFit, ShapeError> {
    let n = ys.len() as f64;
    let mean = ys.iter().sum::<f64>() / n;
    // Interpolated mean-crossing times; consecutive crossings are half a
    // period apart.
    let mut crossings = Vec::new();
    for i in 0..ys.len() - 1 {
        let a = ys[i] - mean;
        let b = ys[i + 1] - mean;
        if a * b < 0.0 {
            let frac = a / (a - b);
            crossings.push(ts[i] + frac * (ts[i + 1] - ts[i]));
        }
    }
    if crossings.len() < 2 {
        return Ok(ShapeFit {
            score: 0.0,
            detail: format!("only {} mean crossings; not oscillating", crossings.len()),
        });
    }
    let half_period =
        (crossings[crossings.len() - 1] - crossings[0]) / (crossings.len() - 1) as f64;
    if half_period <= 0.0 {
        return Ok(ShapeFit {
            score: 0.0,
            detail: "degenerate crossing spacing".into(),
        });
    }
    let omega = std::f64::consts::PI / half_period;
    let cols: Vec<Vec<f64>> = vec![
        vec![1.0; ts.len()],
        ts.iter().map(|t| (omega * t).sin()).collect(),
        ts.iter().map(|t| (omega * t).cos()).collect(),
    ];
    let coeffs = solve_normal_equations(&cols, ys).ok_or(ShapeError::SingularFit)?;
    let pred: Vec<f64> = ts
        .iter()
        .map(|t| coeffs[0] + coeffs[1] * (omega * t).sin() + coeffs[2] * (omega * t).cos())
        .collect();
    Ok(ShapeFit {
        score: r_squared(ys, &pred),
        detail: format!("sinusoid at omega = {omega:.4} rad/s"),
    })
}

fn tolerance_band(ys: &[f64]) -> f64 {
    let lo = ys.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    1e-9 + 1e-6 * (hi - lo)
}

fn monotonic_score(ys: &[f64]) -> ShapeFit {
    let band = tolerance_band(ys);
    let net = ys[ys.len() - 1] - ys[0];
    if net.abs() < 1e-12 {
        // A flat series is weakly monotonic.
        let flat = ys.windows(2).all(|w| (w[1] - w[0]).abs() <= band);
        return ShapeFit {
            score: if flat { 1.0 } else { 0.0 },
            detail: "flat series".into(),
        };
    }
    let dir = net.signum();
    let conforming = ys
        .windows(2)
        .filter(|w| (w[1] - w[0]) * dir >= -band)
        .count();
    ShapeFit {
        score: conforming as f64 / (ys.len() - 1) as f64,
        detail: format!(
            "{} of {} steps {}",
            conforming,
            ys.len() - 1,
            if dir > 0.0 { "non-decreasing" } else { "non-increasing" }
        ),
    }
}

fn single_peak_score(ys: &[f64]) -> ShapeFit {
    let band = tolerance_band(ys);
    let peak = ys
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if peak == 0 || peak == ys.len() - 1 {
        return ShapeFit {
            score: 0.0,
            detail: "maximum lies on the boundary; no interior peak".into(),
        };
    }
    let rising = ys[..=peak]
        .windows(2)
        .filter(|w| w[1] - w[0] >= -band)
        .count();
    let falling = ys[peak..]
        .windows(2)
        .filter(|w| w[1] - w[0] <= band)
        .count();
    ShapeFit {
        score: (rising + falling) as f64 / (ys.len() - 1) as f64,
        detail: format!("peak at index {peak}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(n: usize, dt: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * dt).collect()
    }

    #[test]
    fn parabola_fits_a_ballistic_arc() {
        let ts = times(101, 0.01);
        let ys: Vec<f64> = ts.iter().map(|t| 5.0 - 4.9 * t * t).collect();
        let fit = fit_pattern(ShapePattern::Parabola, &ts, &ys).unwrap();
        assert!(fit.score > 0.9999, "score = {}", fit.score);
    }

    #[test]
    fn linear_fit_rejects_a_parabola() {
        let ts = times(101, 0.02);
        let ys: Vec<f64> = ts.iter().map(|t| t * t).collect();
        let fit = fit_pattern(ShapePattern::Linear, &ts, &ys).unwrap();
        assert!(fit.score < 0.99, "score = {}", fit.score);
    }

    #[test]
    fn exponential_decay_is_recognized() {
        let ts = times(60, 0.05);
        let ys: Vec<f64> = ts.iter().map(|t| 3.0 * (-1.7 * t).exp()).collect();
        let fit = fit_pattern(ShapePattern::Exponential, &ts, &ys).unwrap();
        assert!(fit.score > 0.999, "score = {}", fit.score);
    }

    #[test]
    fn exponential_fit_rejects_mixed_signs() {
        let ts = times(10, 0.1);
        let ys: Vec<f64> = ts.iter().map(|t| t - 0.5).collect();
        assert!(matches!(
            fit_pattern(ShapePattern::Exponential, &ts, &ys),
            Err(ShapeError::MixedSignSeries)
        ));
    }

    #[test]
    fn sinusoid_scores_as_oscillating() {
        let ts = times(200, 0.05);
        let ys: Vec<f64> = ts.iter().map(|t| 2.0 * (3.0 * t).sin() + 0.5).collect();
        let fit = fit_pattern(ShapePattern::Oscillating, &ts, &ys).unwrap();
        assert!(fit.score > 0.95, "score = {}", fit.score);
    }

    #[test]
    fn straight_line_is_not_oscillating() {
        let ts = times(50, 0.1);
        let ys: Vec<f64> = ts.iter().map(|t| 2.0 * t).collect();
        let fit = fit_pattern(ShapePattern::Oscillating, &ts, &ys).unwrap();
        assert!(fit.score < 0.5, "score = {}", fit.score);
    }

    #[test]
    fn monotonic_series_scores_one() {
        let ts = times(50, 0.1);
        let ys: Vec<f64> = ts.iter().map(|t| -3.0 * t).collect();
        let fit = fit_pattern(ShapePattern::Monotonic, &ts, &ys).unwrap();
        assert_eq!(fit.score, 1.0);
    }

    #[test]
    fn bounce_arc_has_a_single_peak() {
        let ts = times(101, 0.02);
        let ys: Vec<f64> = ts.iter().map(|t| 9.8 * t - 4.9 * t * t).collect();
        let fit = fit_pattern(ShapePattern::SinglePeak, &ts, &ys).unwrap();
        assert!(fit.score > 0.99, "score = {}", fit.score);
    }

    #[test]
    fn too_few_samples_is_an_error() {
        assert!(matches!(
            fit_pattern(ShapePattern::Linear, &[0.0, 1.0], &[0.0, 1.0]),
            Err(ShapeError::TooFewSamples(2))
        ));
    }
}
