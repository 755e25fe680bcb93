//! Time-series statistics over plain `f64` slices
//!
//! `NaN` marks a missing observation. Every function drops non-finite values
//! (pairwise for two-series functions) before computing, and returns `None`
//! or an empty result below its sample floor instead of failing.

#![allow(clippy::cast_precision_loss)]

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{LocaleLabels, StatisticsConfig};

/// Fewest paired samples accepted by [`correlate`]
pub const MIN_CORRELATION_SAMPLES: usize = 2;

/// Fewest samples accepted by [`test_normality`] and [`distribution_metrics`]
pub const MIN_NORMALITY_SAMPLES: usize = 3;

/// Fewest complete triples accepted by [`partial_correlation`]
pub const MIN_PARTIAL_CORRELATION_SAMPLES: usize = 3;

/// Finite values of `data`, in order
pub fn finite(data: &[f64]) -> Vec<f64> {
    data.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Pairs where both sides are finite
fn paired(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip()
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Standard deviation with `ddof` degrees of freedom removed
fn std_dev(data: &[f64], ddof: usize) -> Option<f64> {
    if data.len() <= ddof {
        return None;
    }
    let m = mean(data)?;
    let ss = data.iter().map(|x| (x - m).powi(2)).sum::<f64>();
    Some((ss / (data.len() - ddof) as f64).sqrt())
}

fn sorted(data: &[f64]) -> Vec<f64> {
    let mut values = data.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

/// Linear-interpolated percentile of already sorted data, `p` in [0, 100]
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn median(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(percentile_sorted(&sorted(data), 50.0))
}

/// Significance bands for a p-value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignificanceLevel {
    /// p >= 0.1
    NotSignificant,
    /// p < 0.1
    Weak,
    /// p < 0.05
    Moderate,
    /// p < 0.01
    Strong,
    /// p < 0.001
    VeryStrong,
}

impl SignificanceLevel {
    pub fn from_p_value(p_value: f64) -> Self {
        if p_value < 0.001 {
            Self::VeryStrong
        } else if p_value < 0.01 {
            Self::Strong
        } else if p_value < 0.05 {
            Self::Moderate
        } else if p_value < 0.1 {
            Self::Weak
        } else {
            Self::NotSignificant
        }
    }
}

/// Two-sided p-value of a Student's t statistic
fn t_test_p_value(t_stat: f64, df: usize) -> Option<f64> {
    if df == 0 {
        return None;
    }
    if t_stat.is_infinite() {
        return Some(0.0);
    }
    let dist = StudentsT::new(0.0, 1.0, df as f64).ok()?;
    Some((2.0 * (1.0 - dist.cdf(t_stat.abs()))).clamp(0.0, 1.0))
}

/// Two-sided p-value of a standard normal statistic
fn z_test_p_value(z: f64) -> Option<f64> {
    let dist = Normal::new(0.0, 1.0).ok()?;
    Some((2.0 * (1.0 - dist.cdf(z.abs()))).clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
            CorrelationMethod::Kendall => "kendall",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for CorrelationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            "kendall" => Ok(CorrelationMethod::Kendall),
            _ => Err(format!("Unknown correlation method: {}", s)),
        }
    }
}

/// Correlation between two series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Coefficient in [-1, 1]
    pub coefficient: f64,

    /// Two-sided p-value (1.0 when only two pairs exist)
    pub p_value: f64,

    pub method: CorrelationMethod,

    /// Pairs used after dropping missing values
    pub n: usize,
}

impl Correlation {
    pub fn significance(&self) -> SignificanceLevel {
        SignificanceLevel::from_p_value(self.p_value)
    }

    /// Whether |r| exceeds `threshold`
    pub fn is_strong(&self, threshold: f64) -> bool {
        self.coefficient.abs() > threshold
    }
}

/// Every value identical. Zero variance is decided on the data itself, so
/// series on a tiny scale still correlate.
fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn pearson_coefficient(x: &[f64], y: &[f64]) -> Option<f64> {
    if is_constant(x) || is_constant(y) {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denominator = (sxx * syy).sqrt();
    if denominator == 0.0 {
        return None;
    }
    Some((sxy / denominator).clamp(-1.0, 1.0))
}

/// 1-based ranks with ties sharing their average rank
fn ranks(data: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..data.len()).collect();
    order.sort_by(|&a, &b| data[a].total_cmp(&data[b]));

    let mut out = vec![0.0; data.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && data[order[j + 1]] == data[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            out[idx] = rank;
        }
        i = j + 1;
    }
    out
}

fn pearson_p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    let df = n - 2;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r * (df as f64 / denom).sqrt();
    t_test_p_value(t, df).unwrap_or(1.0)
}

/// Kendall tau-b with its normal-approximation p-value
fn kendall_tau_b(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut ties_x, mut ties_y) = (0i64, 0i64);
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx == 0.0 && dy == 0.0 {
                continue;
            } else if dx == 0.0 {
                ties_x += 1;
            } else if dy == 0.0 {
                ties_y += 1;
            } else if dx * dy > 0.0 {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }
    let denominator =
        (((concordant + discordant + ties_x) * (concordant + discordant + ties_y)) as f64).sqrt();
    if denominator == 0.0 {
        return None;
    }
    let tau = ((concordant - discordant) as f64 / denominator).clamp(-1.0, 1.0);

    let nf = n as f64;
    let variance = 2.0 * (2.0 * nf + 5.0) / (9.0 * nf * (nf - 1.0));
    let p_value = z_test_p_value(tau / variance.sqrt()).unwrap_or(1.0);
    Some((tau, p_value))
}

/// Correlation between two index-aligned series with pairwise missing-value
/// removal. `None` below two pairs or when either side has no variance.
pub fn correlate(a: &[f64], b: &[f64], method: CorrelationMethod) -> Option<Correlation> {
    correlate_with_floor(a, b, method, MIN_CORRELATION_SAMPLES)
}

/// [`correlate`] with an explicit minimum number of pairs
pub fn correlate_with_floor(
    a: &[f64],
    b: &[f64],
    method: CorrelationMethod,
    min_samples: usize,
) -> Option<Correlation> {
    let (x, y) = paired(a, b);
    let n = x.len();
    if n < min_samples.max(MIN_CORRELATION_SAMPLES) {
        return None;
    }

    let (coefficient, p_value) = match method {
        CorrelationMethod::Pearson => {
            let r = pearson_coefficient(&x, &y)?;
            (r, pearson_p_value(r, n))
        }
        CorrelationMethod::Spearman => {
            let r = pearson_coefficient(&ranks(&x), &ranks(&y))?;
            (r, pearson_p_value(r, n))
        }
        CorrelationMethod::Kendall => kendall_tau_b(&x, &y)?,
    };

    Some(Correlation {
        coefficient,
        p_value,
        method,
        n,
    })
}

/// Least-squares line fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson r between x and y
    pub r_value: f64,
    /// Two-sided p-value for a non-zero slope, `None` with two points
    pub p_value: Option<f64>,
    /// Standard error of the slope
    pub std_err: f64,
}

impl LinearTrend {
    pub fn r_squared(&self) -> f64 {
        self.r_value * self.r_value
    }
}

/// Fit `y = slope * x + intercept`. `None` below two points or when `x` is constant.
pub fn linear_trend(x: &[f64], y: &[f64]) -> Option<LinearTrend> {
    let (x, y) = paired(x, y);
    let n = x.len();
    if n < 2 {
        return None;
    }

    let mx = mean(&x)?;
    let my = mean(&y)?;
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    let syy: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
    let sxy: f64 = x.iter().zip(&y).map(|(a, b)| (a - mx) * (b - my)).sum();
    if is_constant(&x) || sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r_value = if is_constant(&y) || syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let df = n - 2;
    let (p_value, std_err) = if df == 0 {
        (None, 0.0)
    } else {
        let sse: f64 = x
            .iter()
            .zip(&y)
            .map(|(a, b)| (b - (slope * a + intercept)).powi(2))
            .sum();
        let std_err = (sse / df as f64 / sxx).sqrt();
        let p = if std_err > 0.0 {
            t_test_p_value(slope / std_err, df)
        } else {
            Some(0.0)
        };
        (p, std_err)
    };

    Some(LinearTrend {
        slope,
        intercept,
        r_value,
        p_value,
        std_err,
    })
}

/// Trend of a series against its observation index
pub fn index_trend(values: &[f64]) -> Option<LinearTrend> {
    let observed = finite(values);
    let x: Vec<f64> = (0..observed.len()).map(|i| i as f64).collect();
    linear_trend(&x, &observed)
}

/// Rolling-window statistics, index-aligned with the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub mean: Vec<Option<f64>>,
    /// Sample standard deviation, needs two values in the window
    pub std: Vec<Option<f64>>,
    pub min: Vec<Option<f64>>,
    pub max: Vec<Option<f64>>,
    pub median: Vec<Option<f64>>,
}

/// Trailing-window statistics. A slot is `None` while the window holds fewer
/// than `min_periods` finite values.
pub fn rolling_stats(data: &[f64], window: usize, min_periods: usize) -> RollingStats {
    let window = window.max(1);
    let min_periods = min_periods.max(1);
    let mut stats = RollingStats {
        mean: Vec::with_capacity(data.len()),
        std: Vec::with_capacity(data.len()),
        min: Vec::with_capacity(data.len()),
        max: Vec::with_capacity(data.len()),
        median: Vec::with_capacity(data.len()),
    };

    for i in 0..data.len() {
        let start = (i + 1).saturating_sub(window);
        let values = finite(&data[start..=i]);
        if values.len() < min_periods {
            stats.mean.push(None);
            stats.std.push(None);
            stats.min.push(None);
            stats.max.push(None);
            stats.median.push(None);
            continue;
        }
        stats.mean.push(mean(&values));
        stats.std.push(std_dev(&values, 1));
        stats.min.push(values.iter().copied().reduce(f64::min));
        stats.max.push(values.iter().copied().reduce(f64::max));
        stats.median.push(median(&values));
    }
    stats
}

/// Count, mean, population std, extremes and percentiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// `(percentile, value)` pairs in request order
    pub percentiles: Vec<(f64, f64)>,
}

impl SummaryStats {
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(q, _)| (q - p).abs() < f64::EPSILON)
            .map(|(_, v)| *v)
    }
}

/// Summary of the finite values; `None` when there are none.
/// Default percentiles are 25, 50 and 75.
pub fn summary_stats(data: &[f64], percentiles: Option<&[f64]>) -> Option<SummaryStats> {
    let values = sorted(&finite(data));
    if values.is_empty() {
        return None;
    }
    let requested = percentiles.unwrap_or(&[25.0, 50.0, 75.0]);

    Some(SummaryStats {
        count: values.len(),
        mean: mean(&values)?,
        std: std_dev(&values, 0)?,
        min: values[0],
        max: values[values.len() - 1],
        percentiles: requested
            .iter()
            .map(|&p| (p, percentile_sorted(&values, p)))
            .collect(),
    })
}

/// Shape of a distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionMetrics {
    pub mean: f64,
    pub median: f64,
    /// Most frequent value, smallest on ties
    pub mode: f64,
    /// Population standard deviation
    pub std: f64,
    pub skewness: f64,
    /// Excess kurtosis (normal = 0)
    pub kurtosis: f64,
    pub iqr: f64,
    pub range: f64,
}

/// Biased sample skewness and excess kurtosis
fn moments(values: &[f64]) -> Option<(f64, f64)> {
    let m = mean(values)?;
    let n = values.len() as f64;
    let m2 = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    if is_constant(values) || m2 == 0.0 {
        return None;
    }
    let m3 = values.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
    let m4 = values.iter().map(|x| (x - m).powi(4)).sum::<f64>() / n;
    Some((m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0))
}

fn mode(sorted: &[f64]) -> f64 {
    let mut best = sorted[0];
    let mut best_count = 0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best_count {
            best_count = j - i;
            best = sorted[i];
        }
        i = j;
    }
    best
}

/// Distribution metrics, `None` below three finite values.
/// Skewness and kurtosis are 0 for constant data.
pub fn distribution_metrics(data: &[f64]) -> Option<DistributionMetrics> {
    distribution_metrics_with_floor(data, MIN_NORMALITY_SAMPLES)
}

/// [`distribution_metrics`] with an explicit sample floor (never below three)
pub fn distribution_metrics_with_floor(
    data: &[f64],
    min_samples: usize,
) -> Option<DistributionMetrics> {
    let values = sorted(&finite(data));
    if values.len() < min_samples.max(MIN_NORMALITY_SAMPLES) {
        return None;
    }
    let (skewness, kurtosis) = moments(&values).unwrap_or((0.0, 0.0));

    Some(DistributionMetrics {
        mean: mean(&values)?,
        median: percentile_sorted(&values, 50.0),
        mode: mode(&values),
        std: std_dev(&values, 0)?,
        skewness,
        kurtosis,
        iqr: percentile_sorted(&values, 75.0) - percentile_sorted(&values, 25.0),
        range: values[values.len() - 1] - values[0],
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalityTest {
    /// Skewness/kurtosis test, chi-squared with 2 degrees of freedom
    JarqueBera,
    /// Kolmogorov-Smirnov against the fitted normal
    KolmogorovSmirnov,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityResult {
    pub test: NormalityTest,
    pub statistic: f64,
    pub p_value: f64,
    /// `p_value > 0.05`
    pub normal: bool,
}

/// Asymptotic Kolmogorov distribution survival function
fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let sum: f64 = (1..=100u32)
        .map(|k| {
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            let k = f64::from(k);
            sign * (-2.0 * k * k * lambda * lambda).exp()
        })
        .sum();
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Normality test over the finite values. `None` below three values or
/// for constant data.
pub fn test_normality(data: &[f64], test: NormalityTest) -> Option<NormalityResult> {
    test_normality_with_floor(data, test, MIN_NORMALITY_SAMPLES)
}

/// [`test_normality`] with an explicit sample floor (never below three)
pub fn test_normality_with_floor(
    data: &[f64],
    test: NormalityTest,
    min_samples: usize,
) -> Option<NormalityResult> {
    let values = sorted(&finite(data));
    if values.len() < min_samples.max(MIN_NORMALITY_SAMPLES) {
        return None;
    }
    let n = values.len() as f64;

    let (statistic, p_value) = match test {
        NormalityTest::JarqueBera => {
            let (skew, kurt) = moments(&values)?;
            let jb = n / 6.0 * (skew * skew + kurt * kurt / 4.0);
            let chi2 = ChiSquared::new(2.0).ok()?;
            (jb, (1.0 - chi2.cdf(jb)).clamp(0.0, 1.0))
        }
        NormalityTest::KolmogorovSmirnov => {
            let m = mean(&values)?;
            let s = std_dev(&values, 0)?;
            if is_constant(&values) || s == 0.0 {
                return None;
            }
            let fitted = Normal::new(m, s).ok()?;
            let d = values
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    let cdf = fitted.cdf(x);
                    let above = (i + 1) as f64 / n - cdf;
                    let below = cdf - i as f64 / n;
                    above.max(below)
                })
                .fold(0.0, f64::max);
            let sqrt_n = n.sqrt();
            let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
            (d, kolmogorov_sf(lambda))
        }
    };

    Some(NormalityResult {
        test,
        statistic,
        p_value,
        normal: p_value > 0.05,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// |x - mean| / std > threshold
    ZScore,
    /// Outside [Q1 - threshold*IQR, Q3 + threshold*IQR]
    Iqr,
    /// 0.6745 * |x - median| / MAD > threshold
    ModifiedZScore,
}

/// Outliers with their positions in the original (unfiltered) input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outliers {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl Outliers {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Outlier detection over the finite values; empty below three values or
/// when the spread is zero.
pub fn detect_outliers(data: &[f64], method: OutlierMethod, threshold: f64) -> Outliers {
    let indexed: Vec<(usize, f64)> = data
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .collect();
    if indexed.len() < 3 {
        return Outliers::default();
    }
    let values: Vec<f64> = indexed.iter().map(|(_, v)| *v).collect();

    let is_outlier: Box<dyn Fn(f64) -> bool> = match method {
        OutlierMethod::ZScore => {
            let (Some(m), Some(s)) = (mean(&values), std_dev(&values, 0)) else {
                return Outliers::default();
            };
            if is_constant(&values) || s == 0.0 {
                return Outliers::default();
            }
            Box::new(move |x| ((x - m) / s).abs() > threshold)
        }
        OutlierMethod::Iqr => {
            let sorted_values = sorted(&values);
            let q1 = percentile_sorted(&sorted_values, 25.0);
            let q3 = percentile_sorted(&sorted_values, 75.0);
            let iqr = q3 - q1;
            let (lower, upper) = (q1 - threshold * iqr, q3 + threshold * iqr);
            Box::new(move |x| x < lower || x > upper)
        }
        OutlierMethod::ModifiedZScore => {
            let Some(med) = median(&values) else {
                return Outliers::default();
            };
            let deviations: Vec<f64> = values.iter().map(|x| (x - med).abs()).collect();
            let mad = median(&deviations).unwrap_or(0.0);
            if mad == 0.0 {
                return Outliers::default();
            }
            Box::new(move |x| 0.6745 * (x - med).abs() / mad > threshold)
        }
    };

    let (indices, values) = indexed.into_iter().filter(|(_, v)| is_outlier(*v)).unzip();
    Outliers { indices, values }
}

/// Positions (within the finite values) where the rolling mean jumps by more
/// than `threshold` rolling standard deviations. Empty below `2 * window` values.
pub fn detect_change_points(data: &[f64], window: usize, threshold: f64) -> Vec<usize> {
    let values = finite(data);
    let window = window.max(2);
    if values.len() < 2 * window {
        return Vec::new();
    }

    let rolling = rolling_stats(&values, window, window);
    (window..values.len())
        .filter(|&i| {
            match (rolling.mean[i], rolling.mean[i - 1], rolling.std[i]) {
                (Some(current), Some(previous), Some(std)) if std > 0.0 => {
                    (current - previous).abs() / std > threshold
                }
                _ => false,
            }
        })
        .collect()
}

/// Statistics for one calendar group (weekday or month)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    /// Weekday index (0 = Monday) or month number (1-12)
    pub key: u32,
    pub label: String,
    pub mean: f64,
    /// Sample standard deviation, `None` for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

fn group_stats<K>(dates: &[NaiveDate], values: &[f64], key_of: K) -> BTreeMap<u32, Vec<f64>>
where
    K: Fn(NaiveDate) -> u32,
{
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (date, value) in dates.iter().zip(values) {
        if value.is_finite() {
            groups.entry(key_of(*date)).or_default().push(*value);
        }
    }
    groups
}

fn summarize_groups<L>(groups: BTreeMap<u32, Vec<f64>>, label_of: L) -> Vec<GroupStats>
where
    L: Fn(u32) -> String,
{
    groups
        .into_iter()
        .filter_map(|(key, values)| {
            Some(GroupStats {
                key,
                label: label_of(key),
                mean: mean(&values)?,
                std: std_dev(&values, 1),
                min: values.iter().copied().reduce(f64::min)?,
                max: values.iter().copied().reduce(f64::max)?,
                count: values.len(),
            })
        })
        .collect()
}

/// Per-weekday statistics, Monday first, omitting weekdays without values
pub fn day_of_week_stats(
    dates: &[NaiveDate],
    values: &[f64],
    labels: &LocaleLabels,
) -> Vec<GroupStats> {
    let groups = group_stats(dates, values, |d| d.weekday().num_days_from_monday());
    summarize_groups(groups, |key| labels.weekday_by_index(key).to_string())
}

/// Per-month statistics, January first, omitting months without values
pub fn monthly_stats(dates: &[NaiveDate], values: &[f64], labels: &LocaleLabels) -> Vec<GroupStats> {
    let groups = group_stats(dates, values, |d| d.month());
    summarize_groups(groups, |key| labels.month(key).to_string())
}

/// Weekdays ranked best-first, with the top and bottom three
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestWorstDays {
    pub ranking: Vec<GroupStats>,
    pub best: Vec<GroupStats>,
    pub worst: Vec<GroupStats>,
}

/// Rank weekdays by their mean value. `None` when no weekday has a value.
pub fn best_worst_days(
    dates: &[NaiveDate],
    values: &[f64],
    labels: &LocaleLabels,
    higher_is_better: bool,
) -> Option<BestWorstDays> {
    let mut ranking = day_of_week_stats(dates, values, labels);
    if ranking.is_empty() {
        return None;
    }
    ranking.sort_by(|a, b| {
        let order = a.mean.total_cmp(&b.mean);
        if higher_is_better {
            order.reverse()
        } else {
            order
        }
    });

    let best = ranking.iter().take(3).cloned().collect();
    let worst = ranking[ranking.len().saturating_sub(3)..].to_vec();
    Some(BestWorstDays {
        ranking,
        best,
        worst,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Mean,
    Sum,
    Max,
    Min,
}

impl AggFunc {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            AggFunc::Mean => mean(values),
            AggFunc::Sum => Some(values.iter().sum()),
            AggFunc::Max => values.iter().copied().reduce(f64::max),
            AggFunc::Min => values.iter().copied().reduce(f64::min),
        }
    }
}

/// Aggregated value of one week or month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodValue {
    /// Monday of the ISO week, or the first of the month
    pub start: NaiveDate,
    pub value: f64,
    pub count: usize,
}

fn aggregate_by<K>(
    dates: &[NaiveDate],
    values: &[f64],
    agg: AggFunc,
    start_of: K,
) -> Vec<PeriodValue>
where
    K: Fn(NaiveDate) -> Option<NaiveDate>,
{
    let mut periods: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (date, value) in dates.iter().zip(values) {
        if !value.is_finite() {
            continue;
        }
        if let Some(start) = start_of(*date) {
            periods.entry(start).or_default().push(*value);
        }
    }
    periods
        .into_iter()
        .filter_map(|(start, values)| {
            Some(PeriodValue {
                start,
                value: agg.apply(&values)?,
                count: values.len(),
            })
        })
        .collect()
}

/// Aggregate by ISO week
pub fn weekly_aggregation(dates: &[NaiveDate], values: &[f64], agg: AggFunc) -> Vec<PeriodValue> {
    aggregate_by(dates, values, agg, |d| {
        let week = d.iso_week();
        NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon)
    })
}

/// Aggregate by calendar month
pub fn monthly_aggregation(dates: &[NaiveDate], values: &[f64], agg: AggFunc) -> Vec<PeriodValue> {
    aggregate_by(dates, values, agg, |d| d.with_day(1))
}

/// Pairwise correlation matrix over named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `values[i][j]`, `None` where the pair is not computable
    pub values: Vec<Vec<Option<f64>>>,
    pub method: CorrelationMethod,
}

impl CorrelationMatrix {
    fn index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let (i, j) = (self.index(a)?, self.index(b)?);
        self.values[i][j]
    }

    /// Up to `k` other columns ordered by descending |r| against `target`
    pub fn top_correlated(&self, target: &str, k: usize) -> Vec<(String, f64)> {
        let Some(t) = self.index(target) else {
            return Vec::new();
        };
        let mut candidates: Vec<(String, f64)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != t)
            .filter_map(|(i, name)| self.values[t][i].map(|r| (name.clone(), r)))
            .collect();
        candidates.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        candidates.truncate(k);
        candidates
    }
}

/// Correlation matrix over equally long named columns. Pairs with fewer
/// than `min_samples` finite observations stay `None`.
pub fn correlation_matrix(
    columns: &[(String, Vec<f64>)],
    method: CorrelationMethod,
    min_samples: usize,
) -> CorrelationMatrix {
    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let (a, b) = (&columns[i].1, &columns[j].1);
            let r = if i == j {
                correlate_with_floor(a, a, method, min_samples).map(|_| 1.0)
            } else {
                correlate_with_floor(a, b, method, min_samples).map(|c| c.coefficient)
            };
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        columns: columns.iter().map(|(name, _)| name.clone()).collect(),
        values,
        method,
    }
}

/// Partial correlation of `x` and `y` controlling for `z` (Pearson).
///
/// Uses triples where all three values are finite; `None` below three
/// triples or when `x` or `y` is constant. A constant `z` explains nothing
/// and leaves `r_xy` unchanged. When `z` fully explains `x` or `y` the
/// denominator is zero and the result is 0.
pub fn partial_correlation(x: &[f64], y: &[f64], z: &[f64]) -> Option<f64> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut zs = Vec::new();
    for ((&a, &b), &c) in x.iter().zip(y).zip(z) {
        if a.is_finite() && b.is_finite() && c.is_finite() {
            xs.push(a);
            ys.push(b);
            zs.push(c);
        }
    }
    if xs.len() < MIN_PARTIAL_CORRELATION_SAMPLES {
        return None;
    }

    let r_xy = pearson_coefficient(&xs, &ys)?;
    let r_xz = pearson_coefficient(&xs, &zs).unwrap_or(0.0);
    let r_yz = pearson_coefficient(&ys, &zs).unwrap_or(0.0);

    let denominator = ((1.0 - r_xz * r_xz) * (1.0 - r_yz * r_yz)).sqrt();
    if denominator == 0.0 {
        return Some(0.0);
    }
    Some(((r_xy - r_xz * r_yz) / denominator).clamp(-1.0, 1.0))
}

/// Map `value` linearly from `[old_min, old_max]` onto `[new_min, new_max]`,
/// clamped to the new range. A degenerate old range maps to the midpoint.
pub fn normalize_to_range(
    value: f64,
    old_min: f64,
    old_max: f64,
    new_min: f64,
    new_max: f64,
) -> f64 {
    if old_max == old_min {
        return (new_min + new_max) / 2.0;
    }
    let mapped = (value - old_min) / (old_max - old_min) * (new_max - new_min) + new_min;
    mapped.max(new_min.min(new_max)).min(new_min.max(new_max))
}

/// Standard score of `value`; 0 when `std` is zero
pub fn z_score(value: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    (value - mean) / std
}

/// Percentile rank (0-100) of `value` among the finite values of `data`:
/// `(below + at_or_below + [any equal]) * 50 / n`. An empty sample gives 50.
pub fn percentile_of_score(data: &[f64], value: f64) -> f64 {
    let values = finite(data);
    if values.is_empty() {
        return 50.0;
    }
    let below = values.iter().filter(|v| **v < value).count();
    let at_or_below = values.iter().filter(|v| **v <= value).count();
    let extra = usize::from(at_or_below > below);
    (below + at_or_below + extra) as f64 * 50.0 / values.len() as f64
}

/// Exponentially weighted statistics, index-aligned with the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EwmStats {
    pub mean: Vec<Option<f64>>,
    /// Bias-corrected, needs two observations
    pub std: Vec<Option<f64>>,
    pub var: Vec<Option<f64>>,
}

/// Exponentially weighted mean, variance and std with `alpha = 2 / (span + 1)`.
///
/// Observation weights are `(1 - alpha)^age` normalized by their sum
/// (adjusted form). Missing values still age the earlier observations.
/// A slot is `None` until `min_periods` finite values have been seen.
pub fn ewm_stats(data: &[f64], span: usize, min_periods: usize) -> EwmStats {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let decay = 1.0 - alpha;
    let min_periods = min_periods.max(1);

    let (mut sum_w, mut sum_w2, mut sum_wx, mut sum_wx2) = (0.0, 0.0, 0.0, 0.0);
    let mut seen = 0usize;
    let mut stats = EwmStats {
        mean: Vec::with_capacity(data.len()),
        std: Vec::with_capacity(data.len()),
        var: Vec::with_capacity(data.len()),
    };

    for &x in data {
        sum_w *= decay;
        sum_w2 *= decay * decay;
        sum_wx *= decay;
        sum_wx2 *= decay;
        if x.is_finite() {
            sum_w += 1.0;
            sum_w2 += 1.0;
            sum_wx += x;
            sum_wx2 += x * x;
            seen += 1;
        }

        if seen < min_periods || sum_w == 0.0 {
            stats.mean.push(None);
            stats.std.push(None);
            stats.var.push(None);
            continue;
        }
        let avg = sum_wx / sum_w;
        stats.mean.push(Some(avg));

        let correction = sum_w * sum_w - sum_w2;
        if seen < 2 || correction <= 0.0 {
            stats.std.push(None);
            stats.var.push(None);
            continue;
        }
        let biased = (sum_wx2 / sum_w - avg * avg).max(0.0);
        let var = biased * sum_w * sum_w / correction;
        stats.var.push(Some(var));
        stats.std.push(Some(var.sqrt()));
    }
    stats
}

/// Autocorrelation and partial autocorrelation for lags `0..=nlags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autocorrelation {
    pub acf: Vec<f64>,
    /// Durbin-Levinson recursion over the sample ACF
    pub pacf: Vec<f64>,
}

/// Sample ACF and PACF of the finite values. `None` below `nlags + 1`
/// values or for a constant series.
pub fn autocorrelation(data: &[f64], nlags: usize) -> Option<Autocorrelation> {
    let values = finite(data);
    let n = values.len();
    if n < nlags + 1 || is_constant(&values) {
        return None;
    }
    let m = mean(&values)?;
    let centered: Vec<f64> = values.iter().map(|v| v - m).collect();
    let c0: f64 = centered.iter().map(|v| v * v).sum();
    if c0 == 0.0 {
        return None;
    }

    let acf: Vec<f64> = (0..=nlags)
        .map(|lag| {
            centered
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / c0
        })
        .collect();

    let mut pacf = vec![1.0];
    let mut phi: Vec<f64> = Vec::new();
    for k in 1..=nlags {
        let numerator = acf[k] - (1..k).map(|j| phi[j - 1] * acf[k - j]).sum::<f64>();
        let denominator = 1.0 - (1..k).map(|j| phi[j - 1] * acf[j]).sum::<f64>();
        if denominator == 0.0 {
            pacf.resize(nlags + 1, 0.0);
            break;
        }
        let phi_kk = numerator / denominator;
        let mut next: Vec<f64> = (1..k).map(|j| phi[j - 1] - phi_kk * phi[k - j - 1]).collect();
        next.push(phi_kk);
        phi = next;
        pacf.push(phi_kk);
    }

    Some(Autocorrelation { acf, pacf })
}

/// Everything the statistics module reports about one series, with floors
/// and windows taken from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesProfile {
    pub summary: Option<SummaryStats>,
    pub distribution: Option<DistributionMetrics>,
    /// Jarque-Bera
    pub normality: Option<NormalityResult>,
    pub trend: Option<LinearTrend>,
    pub rolling: RollingStats,
    pub ewm: EwmStats,
    /// Z-score outliers at the configured threshold
    pub outliers: Outliers,
    pub change_points: Vec<usize>,
}

/// Profile a daily series (`NaN` for missing days)
pub fn profile_series(data: &[f64], config: &StatisticsConfig) -> SeriesProfile {
    SeriesProfile {
        summary: summary_stats(data, None),
        distribution: distribution_metrics_with_floor(data, config.min_normality_samples),
        normality: test_normality_with_floor(
            data,
            NormalityTest::JarqueBera,
            config.min_normality_samples,
        ),
        trend: index_trend(data),
        rolling: rolling_stats(data, config.rolling_window, config.rolling_min_periods),
        ewm: ewm_stats(data, config.rolling_window, config.rolling_min_periods),
        outliers: detect_outliers(data, OutlierMethod::ZScore, config.outlier_threshold),
        change_points: detect_change_points(data, config.rolling_window, config.outlier_threshold),
    }
}
