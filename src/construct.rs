//! Building the representations from an exact distribution.
//!
//! The input is a vector of non-negative integer weights; outcome `i` has probability
//! `w_i / Z` with `Z = sum(w)`. Every such probability has an eventually periodic
//! binary expansion, and all of them fit one common shape: a prefix of `l` digits
//! followed by a repeating block of `k - l` digits. Over that shape each probability is
//! `M_i / Z_kl` with `Z_kl = 2^k - 2^l` (or `2^k` when the expansion terminates), and
//! the digits of `M_i / Z_kl` are the rows of the probability matrix.
//!
//! ## References
//!
//! - Saad, Freer, Rinard, Mansinghka (2020): *Optimal Approximate Sampling from
//!   Discrete Probability Distributions*, Section 5.

use log::debug;

use crate::cached::CachedMatrix;
use crate::encoding::EncodingTree;
use crate::error::FormatError;
use crate::matrix::ProbabilityMatrix;
use crate::table::Table;

/// Largest expansion length; `2^k` must fit the integer arithmetic below.
pub const MAX_PRECISION: usize = 62;

/// Errors for building a representation from weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructError {
    /// No outcomes.
    Empty,
    /// Every weight is zero.
    ZeroTotal,
    /// The weights do not sum within `u64`.
    TotalOverflow,
    /// The expansion needs more than [`MAX_PRECISION`] digits.
    PrecisionTooLarge { k: usize },
    /// The digits did not form a valid tree.
    Invalid(FormatError),
}

impl std::fmt::Display for ConstructError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "distribution has no outcomes"),
            Self::ZeroTotal => write!(f, "weights must not all be zero"),
            Self::TotalOverflow => write!(f, "sum of weights overflows u64"),
            Self::PrecisionTooLarge { k } => write!(
                f,
                "binary expansion needs {k} digits (at most {MAX_PRECISION} supported)"
            ),
            Self::Invalid(e) => write!(f, "internal construction error: {e}"),
        }
    }
}

impl std::error::Error for ConstructError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invalid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FormatError> for ConstructError {
    fn from(e: FormatError) -> Self {
        Self::Invalid(e)
    }
}

/// Probability matrix for `weights`.
///
/// A single weight yields the degenerate one-outcome matrix `[[1]]`.
pub fn matrix_from_weights(weights: &[u64]) -> Result<ProbabilityMatrix, ConstructError> {
    if weights.is_empty() {
        return Err(ConstructError::Empty);
    }
    let total = weights
        .iter()
        .try_fold(0u64, |acc, &w| acc.checked_add(w))
        .ok_or(ConstructError::TotalOverflow)?;
    if total == 0 {
        return Err(ConstructError::ZeroTotal);
    }

    let g = weights.iter().fold(0, |acc, &w| gcd(acc, w));
    let z = total / g;
    let (k, l) = expansion_shape(z)?;
    let z_kl = denominator(k, l);
    let numerators: Vec<u64> = weights
        .iter()
        .map(|&w| ((w / g) as u128 * z_kl as u128 / z as u128) as u64)
        .collect();

    let (numerators, k, l) = reduce(numerators, k, l);
    let rows: Vec<Vec<u32>> = numerators.iter().map(|&m| digits(m, k, l)).collect();
    debug!(
        "built matrix for {} outcomes: Z={z} k={k} l={l}",
        weights.len()
    );

    // Digits of exact fractions summing to one always describe a valid tree.
    Ok(ProbabilityMatrix::new(Table::from_rows(rows)?, k, l)?)
}

/// Cached matrix for `weights`.
pub fn cached_from_weights(weights: &[u64]) -> Result<CachedMatrix, ConstructError> {
    matrix_from_weights(weights).map(|m| CachedMatrix::from_matrix(&m))
}

/// Flattened tree for `weights`.
pub fn encoding_from_weights(weights: &[u64]) -> Result<EncodingTree, ConstructError> {
    matrix_from_weights(weights).map(|m| EncodingTree::from_matrix(&m))
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Smallest `e >= 1` with `2^e = 1 (mod m)`, for odd `m`.
fn order_of_two(m: u64) -> Result<usize, ConstructError> {
    if m == 1 {
        return Ok(1);
    }
    let mut x = 2 % m;
    for e in 1..=MAX_PRECISION {
        if x == 1 {
            return Ok(e);
        }
        x = ((x as u128 * 2) % m as u128) as u64;
    }
    Err(ConstructError::PrecisionTooLarge {
        k: MAX_PRECISION + 1,
    })
}

/// `(k, l)` such that every multiple of `1/z` is `M / Z_kl` for an integer `M`.
fn expansion_shape(z: u64) -> Result<(usize, usize), ConstructError> {
    let t = z.trailing_zeros() as usize;
    let odd = z >> t;
    let (k, l) = if odd == 1 {
        (t, t)
    } else if t == 0 {
        (order_of_two(odd)?, 0)
    } else {
        (order_of_two(odd)? + t, t)
    };
    if k > MAX_PRECISION {
        return Err(ConstructError::PrecisionTooLarge { k });
    }
    // z == 1 is a point mass: 0.111... over one periodic digit.
    Ok(if k == 0 { (1, 0) } else { (k, l) })
}

/// `Z_kl = 2^k - 2^l`, or `2^k` for a terminating expansion.
pub(crate) fn denominator(k: usize, l: usize) -> u64 {
    if l == k {
        1 << k
    } else {
        (1 << k) - (1 << l)
    }
}

/// Shrink `(M, k, l)` to the shortest expansion of the same fractions.
fn reduce(mut ms: Vec<u64>, mut k: usize, mut l: usize) -> (Vec<u64>, usize, usize) {
    loop {
        let z_kl = denominator(k, l);
        if ms.iter().any(|&m| m == z_kl) {
            return (ms.iter().map(|&m| m / z_kl).collect(), 1, 0);
        }
        if l == 0 {
            return (ms, k, l);
        }
        if ms.iter().all(|&m| m % 2 == 0) {
            ms.iter_mut().for_each(|m| *m /= 2);
            k -= 1;
            l -= 1;
            continue;
        }
        let first = ms[0];
        if ms.iter().all(|&m| m == first) && (z_kl / first).is_power_of_two() {
            let j = (z_kl / first).trailing_zeros() as usize;
            return (vec![1; ms.len()], j, j);
        }
        return (ms, k, l);
    }
}

/// Binary digits of `m / Z_kl`: `l` prefix digits, then one period of `k - l` digits.
fn digits(m: u64, k: usize, l: usize) -> Vec<u32> {
    let (x, y) = if l == k {
        (m, 0)
    } else if l == 0 {
        (0, m)
    } else {
        let period = (1u64 << (k - l)) - 1;
        (m / period, m % period)
    };
    let mut out = Vec::with_capacity(k);
    push_bits(x, l, &mut out);
    push_bits(y, k - l, &mut out);
    out
}

fn push_bits(x: u64, width: usize, out: &mut Vec<u32>) {
    out.extend((0..width).rev().map(|i| ((x >> i) & 1) as u32));
}
