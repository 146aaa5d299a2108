//! Knuth-Yao sampling over a probability matrix.
//!
//! Row `r` of the matrix holds the binary expansion of the probability of outcome
//! `r + 1`, most significant digit first. Column `c` is level `c` of the DDG tree: the
//! ones in that column are its leaves, in row order. Columns `l..k` repeat forever when
//! the expansion is periodic.
//!
//! The sampler never materializes the tree. It tracks a depth counter `d`, the index of
//! the current node among the nodes of its level, and scans one column per bit.
//!
//! ## References
//!
//! - Knuth, Yao (1976): *The complexity of nonuniform random number generation*.
//! - Saad, Freer, Rinard, Mansinghka (2020): *Optimal Approximate Sampling from
//!   Discrete Probability Distributions*.

use crate::bits::RandomBits;
use crate::error::{check_levels, FormatError};
use crate::table::Table;

/// Binary expansions of a discrete distribution, one row per outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbabilityMatrix {
    p: Table<u32>,
    k: usize,
    l: usize,
}

impl ProbabilityMatrix {
    /// Validate `p` as an `n x k` matrix of binary digits whose columns `l..k` repeat.
    ///
    /// `l == k` declares a terminating expansion.
    pub fn new(p: Table<u32>, k: usize, l: usize) -> Result<Self, FormatError> {
        if p.cols() != k {
            return Err(FormatError::ShapeMismatch {
                what: "matrix columns",
                expected: k,
                found: p.cols(),
            });
        }
        for (row, digits) in p.iter_rows().enumerate() {
            if let Some((col, &value)) = digits.iter().enumerate().find(|(_, &v)| v > 1) {
                return Err(FormatError::NonBinaryEntry { row, col, value });
            }
        }
        check_levels(&column_sums(&p), l)?;
        Ok(Self { p, k, l })
    }

    /// Number of outcomes.
    pub fn outcomes(&self) -> usize {
        self.p.rows()
    }

    /// Length of the expansion.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Column the traversal resumes at after column `k - 1`.
    pub fn l(&self) -> usize {
        self.l
    }

    /// The digits, one row per outcome.
    pub fn table(&self) -> &Table<u32> {
        &self.p
    }

    /// Number of ones in each column: the leaf count at each level.
    pub fn hamming_vector(&self) -> Vec<u32> {
        column_sums(&self.p).into_iter().map(|h| h as u32).collect()
    }

    /// Draw one outcome label (1-based).
    #[inline]
    pub fn sample<B: RandomBits + ?Sized>(&self, bits: &mut B) -> usize {
        let n = self.p.rows();
        if n == 1 {
            return 1;
        }

        let mut c = 0usize;
        let mut d = 0i64;
        loop {
            let b = i64::from(bits.next_bit());
            d = 2 * d + (1 - b);
            for r in 0..n {
                d -= i64::from(*self.p.get(r, c));
                if d == -1 {
                    return r + 1;
                }
            }
            c = if c == self.k - 1 { self.l } else { c + 1 };
        }
    }
}

fn column_sums(p: &Table<u32>) -> Vec<u64> {
    (0..p.cols())
        .map(|c| p.column(c).map(u64::from).sum())
        .collect()
}
