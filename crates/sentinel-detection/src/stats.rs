//! Two-sample tests used by the statistical drift algorithm.
//!
//! p-values use the usual asymptotic approximations: the Kolmogorov
//! distribution for KS and the Wilson-Hilferty normal approximation for
//! chi-square. They are accurate enough to rank drift, not to publish.

use price_sentinel_core::{Error, Result};
use std::cmp::Ordering;

/// Outcome of a two-sample test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

/// Which test a feature is checked with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTest {
    KolmogorovSmirnov,
    ChiSquare,
}

impl StatTest {
    /// Features with at most this many distinct reference values are
    /// treated as categorical.
    pub const CATEGORICAL_MAX_DISTINCT: usize = 5;

    /// Pick the test from the shape of the reference column
    pub fn for_reference(reference: &[f64]) -> Self {
        if distinct_count(reference) <= Self::CATEGORICAL_MAX_DISTINCT {
            StatTest::ChiSquare
        } else {
            StatTest::KolmogorovSmirnov
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatTest::KolmogorovSmirnov => "K-S p_value",
            StatTest::ChiSquare => "chi-square p_value",
        }
    }

    pub fn run(&self, reference: &[f64], current: &[f64]) -> Result<TestOutcome> {
        match self {
            StatTest::KolmogorovSmirnov => ks_test(reference, current),
            StatTest::ChiSquare => chi_square_test(reference, current),
        }
    }
}

fn check_sample(label: &str, data: &[f64]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::statistics(format!("{} sample is empty", label)));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(Error::statistics(format!("{} sample contains non-finite values", label)));
    }
    Ok(())
}

fn sorted(data: &[f64]) -> Vec<f64> {
    let mut values = data.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

/// Number of distinct values
pub fn distinct_count(data: &[f64]) -> usize {
    let mut values = sorted(data);
    values.dedup();
    values.len()
}

/// Two-sample Kolmogorov-Smirnov statistic: the largest gap between the
/// empirical CDFs. Tied values are consumed together on both sides.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let a = sorted(a);
    let b = sorted(b);
    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;

    while i < a.len() && j < b.len() {
        let v = a[i].min(b[j]);
        while i < a.len() && a[i] <= v {
            i += 1;
        }
        while j < b.len() && b[j] <= v {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }
    d
}

pub fn ks_test(reference: &[f64], current: &[f64]) -> Result<TestOutcome> {
    check_sample("reference", reference)?;
    check_sample("current", current)?;

    let d = ks_statistic(reference, current);
    let (n, m) = (reference.len() as f64, current.len() as f64);
    let ne = (n * m / (n + m)).sqrt();
    // Stephens' small-sample correction
    let lambda = (ne + 0.12 + 0.11 / ne) * d;

    Ok(TestOutcome {
        statistic: d,
        p_value: ks_p_value(lambda),
    })
}

/// Survival function of the Kolmogorov distribution
pub fn ks_p_value(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let mut p = 0.0;
    for k in 1..=100 {
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        let term = sign * (-2.0 * f64::from(k).powi(2) * lambda.powi(2)).exp();
        p += term;
        if term.abs() < 1e-10 {
            break;
        }
    }
    (2.0 * p).clamp(0.0, 1.0)
}

/// Chi-square goodness of fit of the current category counts against the
/// frequencies expected from the reference.
///
/// Categories are the union of values seen on either side. A value absent
/// from the reference but present now makes the statistic infinite, p = 0.
pub fn chi_square_test(reference: &[f64], current: &[f64]) -> Result<TestOutcome> {
    check_sample("reference", reference)?;
    check_sample("current", current)?;

    let mut categories: Vec<f64> = reference.iter().chain(current).copied().collect();
    categories.sort_by(f64::total_cmp);
    categories.dedup();

    if categories.len() < 2 {
        return Ok(TestOutcome {
            statistic: 0.0,
            p_value: 1.0,
        });
    }

    let ref_counts = category_counts(reference, &categories);
    let cur_counts = category_counts(current, &categories);
    let scale = current.len() as f64 / reference.len() as f64;

    let mut chi_sq = 0.0;
    for (observed, ref_count) in cur_counts.iter().zip(&ref_counts) {
        let expected = *ref_count as f64 * scale;
        let observed = *observed as f64;
        if expected == 0.0 {
            if observed > 0.0 {
                chi_sq = f64::INFINITY;
                break;
            }
            continue;
        }
        chi_sq += (observed - expected).powi(2) / expected;
    }

    Ok(TestOutcome {
        statistic: chi_sq,
        p_value: chi_square_p_value(chi_sq, categories.len() - 1),
    })
}

fn category_counts(data: &[f64], categories: &[f64]) -> Vec<usize> {
    let mut counts = vec![0usize; categories.len()];
    for value in data {
        if let Ok(index) = categories.binary_search_by(|c| c.total_cmp(value)) {
            counts[index] += 1;
        }
    }
    counts
}

/// Upper tail of the chi-square distribution (Wilson-Hilferty)
pub fn chi_square_p_value(chi_sq: f64, df: usize) -> f64 {
    if df == 0 || chi_sq <= 0.0 {
        return 1.0;
    }
    if chi_sq.is_infinite() {
        return 0.0;
    }
    let k = df as f64;
    let z = ((chi_sq / k).powf(1.0 / 3.0) - (1.0 - 2.0 / (9.0 * k))) / (2.0 / (9.0 * k)).sqrt();
    (0.5 * (1.0 - erf(z / std::f64::consts::SQRT_2))).clamp(0.0, 1.0)
}

/// Error function (Abramowitz and Stegun 7.1.26)
pub fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = match x.partial_cmp(&0.0) {
        Some(Ordering::Less) => -1.0,
        _ => 1.0,
    };
    let x = x.abs();
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}
