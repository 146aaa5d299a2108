//! Closest exact distribution at a fixed precision.
//!
//! The samplers need rational probabilities `M_i / Z`. When the target is only known as
//! floating-point numbers (or has irrational entries), this module picks the integer
//! numerators that minimize an f-divergence from the target for a given `Z`, without
//! enumerating the candidates:
//!
//! 1. round every `Z p_i` to whichever neighbour costs less,
//! 2. trade single units between the cheapest decrement and increment while the trade
//!    lowers the divergence,
//! 3. add or remove the remaining units one at a time, cheapest first.
//!
//! [`approximate`] repeats this for every `Z_kl = 2^k - 2^l` of one precision `k` and
//! keeps the best; [`approximate_within`] raises `k` until an error bound is met.
//!
//! ## References
//!
//! - Saad, Freer, Rinard, Mansinghka (2020): *Optimal Approximate Sampling from
//!   Discrete Probability Distributions*, Section 4.

use std::str::FromStr;

use log::debug;

use crate::construct::{denominator, matrix_from_weights, ConstructError, MAX_PRECISION};
use crate::matrix::ProbabilityMatrix;

/// How far the target may sum from one before it is rejected.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// An f-divergence `D(p || q) = sum over p_i > 0 of kernel(p_i, q_i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Divergence {
    TotalVariation,
    Hellinger,
    PearsonChiSquare,
    NeymanChiSquare,
    TriangularDiscrimination,
    /// Kullback-Leibler, in bits.
    RelativeEntropy,
    ReverseRelativeEntropy,
    JensenShannon,
}

impl Divergence {
    /// Every supported divergence.
    pub const ALL: [Divergence; 8] = [
        Self::TotalVariation,
        Self::Hellinger,
        Self::PearsonChiSquare,
        Self::NeymanChiSquare,
        Self::TriangularDiscrimination,
        Self::RelativeEntropy,
        Self::ReverseRelativeEntropy,
        Self::JensenShannon,
    ];

    /// Key used on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Self::TotalVariation => "tv",
            Self::Hellinger => "hellinger",
            Self::PearsonChiSquare => "pchi2",
            Self::NeymanChiSquare => "nchi2",
            Self::TriangularDiscrimination => "td",
            Self::RelativeEntropy => "kl",
            Self::ReverseRelativeEntropy => "reverse_kl",
            Self::JensenShannon => "js",
        }
    }

    /// Whether a finite error needs `q_i > 0` wherever `p_i > 0`.
    pub fn needs_full_support(self) -> bool {
        matches!(self, Self::NeymanChiSquare | Self::RelativeEntropy)
    }

    /// Contribution of one outcome with target `a` and approximation `b`.
    pub fn kernel(self, a: f64, b: f64) -> f64 {
        match self {
            Self::TotalVariation => 0.5 * (a - b).abs(),
            Self::Hellinger => (a.sqrt() - b.sqrt()).powi(2),
            Self::PearsonChiSquare => pearson(a, b),
            Self::NeymanChiSquare => pearson(b, a),
            Self::TriangularDiscrimination => {
                if a + b == 0.0 {
                    0.0
                } else {
                    (a - b).powi(2) / (a + b)
                }
            }
            Self::RelativeEntropy => relative_entropy(a, b),
            Self::ReverseRelativeEntropy => relative_entropy(b, a),
            Self::JensenShannon => {
                let m = (a + b) / 2.0;
                relative_entropy(a, m) + relative_entropy(b, m)
            }
        }
    }
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Divergence {
    type Err = ApproxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.key() == s)
            .ok_or_else(|| ApproxError::UnknownDivergence(s.to_string()))
    }
}

fn pearson(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        f64::INFINITY
    } else if b == 0.0 {
        a
    } else {
        (a - b).powi(2) / a
    }
}

fn relative_entropy(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        0.0
    } else if b == 0.0 {
        f64::INFINITY
    } else {
        a * (a.log2() - b.log2())
    }
}

/// `D(target || approx)`; outcomes with zero target probability contribute nothing.
pub fn divergence(target: &[f64], approx: &[f64], divergence: Divergence) -> f64 {
    target
        .iter()
        .zip(approx)
        .filter(|(&a, _)| a > 0.0)
        .map(|(&a, &b)| divergence.kernel(a, b))
        .sum()
}

/// Errors for approximating a distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum ApproxError {
    /// No outcomes.
    Empty,
    /// A probability is negative, infinite or NaN.
    InvalidProbability { index: usize, value: f64 },
    /// The probabilities do not sum to one within [`SUM_TOLERANCE`].
    NotNormalized { sum: f64 },
    /// `Z` is zero.
    ZeroTotal,
    /// Precision outside `1..=MAX_PRECISION`.
    InvalidPrecision { k: usize },
    /// Error bound is negative or NaN.
    InvalidTolerance { max_error: f64 },
    /// The exchange step did not settle; only seen with severe rounding error.
    NoConvergence { iterations: usize },
    /// No precision up to [`MAX_PRECISION`] meets the error bound.
    Unreachable { max_error: f64, best: f64 },
    /// No divergence has this key.
    UnknownDivergence(String),
}

impl std::fmt::Display for ApproxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "distribution has no outcomes"),
            Self::InvalidProbability { index, value } => {
                write!(f, "probability {value} of outcome {} is invalid", index + 1)
            }
            Self::NotNormalized { sum } => write!(f, "probabilities sum to {sum}, not 1"),
            Self::ZeroTotal => write!(f, "denominator must be positive"),
            Self::InvalidPrecision { k } => {
                write!(f, "precision {k} is outside 1..={MAX_PRECISION}")
            }
            Self::InvalidTolerance { max_error } => {
                write!(f, "error bound {max_error} must be non-negative")
            }
            Self::NoConvergence { iterations } => {
                write!(f, "optimization did not settle after {iterations} exchanges")
            }
            Self::Unreachable { max_error, best } => write!(
                f,
                "no precision up to {MAX_PRECISION} reaches error {max_error} (best {best})"
            ),
            Self::UnknownDivergence(key) => write!(f, "unknown divergence {key:?}"),
        }
    }
}

impl std::error::Error for ApproxError {}

/// Numerators `M` with `sum(M) == z` minimizing `D(target || M / z)`.
///
/// Outcomes with zero target probability get zero. When `z` is smaller than the support,
/// some outcomes get zero as well and divergences that need full support are infinite.
pub fn optimal_numerators(
    target: &[f64],
    z: u64,
    divergence: Divergence,
) -> Result<Vec<u64>, ApproxError> {
    let target = normalized(target)?;
    numerators(&target, z, divergence)
}

/// Best approximation of one precision.
#[derive(Debug, Clone, PartialEq)]
pub struct Approximation {
    /// Integer weights, one per outcome, summing to `total`.
    pub weights: Vec<u64>,
    /// Expansion length.
    pub k: usize,
    /// Prefix length; `total` is `2^k - 2^l`, or `2^k` when `l == k`.
    pub l: usize,
    /// `Z`, the sum of the weights.
    pub total: u64,
    /// Divergence from the target.
    pub error: f64,
}

impl Approximation {
    /// `weights / total`.
    pub fn probabilities(&self) -> Vec<f64> {
        probabilities(&self.weights, self.total)
    }

    /// Probability matrix of the weights.
    ///
    /// Weights that share a factor with the total reduce to a shorter expansion than
    /// `(k, l)`.
    pub fn matrix(&self) -> Result<ProbabilityMatrix, ConstructError> {
        matrix_from_weights(&self.weights)
    }
}

/// Lowest-error approximation over every `Z_kl` with `0 <= l <= k`.
///
/// Ties keep the larger `l`.
pub fn approximate(
    target: &[f64],
    k: usize,
    divergence: Divergence,
) -> Result<Approximation, ApproxError> {
    let target = normalized(target)?;
    best_at_precision(&target, k, divergence)
}

/// Approximation at the smallest precision whose error is at most `max_error`.
///
/// Divergences that need full support start at the first precision that can give every
/// outcome a unit.
pub fn approximate_within(
    target: &[f64],
    divergence: Divergence,
    max_error: f64,
) -> Result<Approximation, ApproxError> {
    if max_error.is_nan() || max_error < 0.0 {
        return Err(ApproxError::InvalidTolerance { max_error });
    }
    let target = normalized(target)?;

    let start = if divergence.needs_full_support() {
        let support = target.iter().filter(|&&p| p > 0.0).count();
        (support.next_power_of_two().trailing_zeros() as usize).max(1)
    } else {
        1
    };

    let mut best = f64::INFINITY;
    for k in start..=MAX_PRECISION {
        let found = best_at_precision(&target, k, divergence)?;
        debug!("{divergence} k={k}: error {} at Z={}", found.error, found.total);
        if found.error <= max_error {
            return Ok(found);
        }
        best = best.min(found.error);
    }
    Err(ApproxError::Unreachable { max_error, best })
}

fn best_at_precision(
    target: &[f64],
    k: usize,
    divergence: Divergence,
) -> Result<Approximation, ApproxError> {
    if k == 0 || k > MAX_PRECISION {
        return Err(ApproxError::InvalidPrecision { k });
    }

    let mut best: Option<Approximation> = None;
    for l in (0..=k).rev() {
        let total = denominator(k, l);
        let weights = numerators(target, total, divergence)?;
        let error = self::divergence(target, &probabilities(&weights, total), divergence);
        if best.as_ref().map_or(true, |b| error < b.error) {
            best = Some(Approximation {
                weights,
                k,
                l,
                total,
                error,
            });
        }
    }
    best.ok_or(ApproxError::InvalidPrecision { k })
}

fn probabilities(weights: &[u64], total: u64) -> Vec<f64> {
    weights.iter().map(|&w| w as f64 / total as f64).collect()
}

/// Checked copy of `target` scaled to sum to exactly one.
fn normalized(target: &[f64]) -> Result<Vec<f64>, ApproxError> {
    if target.is_empty() {
        return Err(ApproxError::Empty);
    }
    if let Some((index, &value)) = target
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        return Err(ApproxError::InvalidProbability { index, value });
    }
    let sum: f64 = target.iter().sum();
    if (sum - 1.0).abs() > SUM_TOLERANCE {
        return Err(ApproxError::NotNormalized { sum });
    }
    Ok(target.iter().map(|p| p / sum).collect())
}

/// Numerators over the whole target, zeros kept at zero.
fn numerators(target: &[f64], z: u64, divergence: Divergence) -> Result<Vec<u64>, ApproxError> {
    if z == 0 {
        return Err(ApproxError::ZeroTotal);
    }
    let support: Vec<usize> = (0..target.len()).filter(|&i| target[i] > 0.0).collect();
    let p: Vec<f64> = support.iter().map(|&i| target[i]).collect();

    let objective = Objective { p: &p, z, divergence };
    let ms = objective.optimize()?;

    let mut out = vec![0; target.len()];
    for (&i, m) in support.iter().zip(ms) {
        out[i] = m;
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Down,
    Up,
}

/// Strictly positive target `p` over denominator `z`.
struct Objective<'a> {
    p: &'a [f64],
    z: u64,
    divergence: Divergence,
}

impl Objective<'_> {
    /// Change in divergence from moving outcome `i` one unit away from `m`.
    fn delta(&self, i: usize, m: u64, step: Step) -> f64 {
        let next = match step {
            Step::Down if m == 0 => return f64::INFINITY,
            Step::Up if m == self.z => return f64::INFINITY,
            Step::Down => m - 1,
            Step::Up => m + 1,
        };
        let z = self.z as f64;
        self.divergence.kernel(self.p[i], next as f64 / z)
            - self.divergence.kernel(self.p[i], m as f64 / z)
    }

    fn optimize(&self) -> Result<Vec<u64>, ApproxError> {
        if self.p.len() == 1 {
            return Ok(vec![self.z]);
        }
        let mut ms = self.initial();
        self.exchange(&mut ms)?;
        self.settle(&mut ms)?;
        Ok(ms)
    }

    fn initial(&self) -> Vec<u64> {
        self.p
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let m = ((self.z as f64 * p).floor() as u64).min(self.z);
                if self.delta(i, m, Step::Up) < 0.0 {
                    m + 1
                } else {
                    m
                }
            })
            .collect()
    }

    /// Move units from the cheapest decrement to the cheapest increment while that helps.
    fn exchange(&self, ms: &mut [u64]) -> Result<(), ApproxError> {
        let n = ms.len();
        let mut down: Vec<f64> = (0..n).map(|i| self.delta(i, ms[i], Step::Down)).collect();
        let mut up: Vec<f64> = (0..n).map(|i| self.delta(i, ms[i], Step::Up)).collect();

        // At most one exchange per outcome, plus slack.
        let limit = n + 1;
        let mut iterations = 0;
        loop {
            let (from, to) = cheapest_exchange(&down, &up);
            let gain = down[from] + up[to];
            if gain.is_nan() || gain >= 0.0 {
                return Ok(());
            }
            ms[from] -= 1;
            ms[to] += 1;
            // Only the two moved costs are refreshed.
            down[from] = self.delta(from, ms[from], Step::Down);
            up[to] = self.delta(to, ms[to], Step::Up);

            iterations += 1;
            if iterations > limit {
                return Err(ApproxError::NoConvergence { iterations });
            }
        }
    }

    /// Add or remove single units until the numerators sum to `z`.
    fn settle(&self, ms: &mut [u64]) -> Result<(), ApproxError> {
        let n = ms.len();
        let sum: u128 = ms.iter().map(|&m| u128::from(m)).sum();
        let z = u128::from(self.z);
        let (step, mut remaining) = if sum < z {
            (Step::Up, z - sum)
        } else {
            (Step::Down, sum - z)
        };
        let mut costs: Vec<f64> = (0..n).map(|i| self.delta(i, ms[i], step)).collect();

        while remaining > 0 {
            let mut best: Option<usize> = None;
            for i in 0..n {
                let movable = match step {
                    Step::Up => ms[i] < self.z,
                    Step::Down => ms[i] > 0,
                };
                if movable && best.map_or(true, |b| costs[i] <= costs[b]) {
                    best = Some(i);
                }
            }
            let Some(j) = best else {
                return Err(ApproxError::NoConvergence { iterations: n });
            };
            match step {
                Step::Up => ms[j] += 1,
                Step::Down => ms[j] -= 1,
            }
            costs[j] = self.delta(j, ms[j], step);
            remaining -= 1;
        }
        Ok(())
    }
}

/// Indexes of the two smallest values, smallest first; later indexes win ties.
fn two_smallest(values: &[f64]) -> (usize, usize) {
    let (mut first, mut second) = if values[1] <= values[0] { (1, 0) } else { (0, 1) };
    for (i, &x) in values.iter().enumerate().skip(2) {
        if x <= values[first] {
            second = first;
            first = i;
        } else if x < values[second] {
            second = i;
        }
    }
    (first, second)
}

/// Distinct `(from, to)` minimizing `down[from] + up[to]`.
fn cheapest_exchange(down: &[f64], up: &[f64]) -> (usize, usize) {
    let (d0, d1) = two_smallest(down);
    let (u0, u1) = two_smallest(up);
    if d0 != u0 {
        (d0, u0)
    } else if down[d0] + up[u1] <= down[d1] + up[u0] {
        (d0, u1)
    } else {
        (d1, u0)
    }
}
