//! Knuth-Yao sampling with a precomputed leaf lookup.
//!
//! [`ProbabilityMatrix::sample`] finds the leaf for depth counter `d` by scanning the
//! whole column. The leaves of a column are just its ones in row order, so they can be
//! tabulated once: `h[c]` is the number of leaves at level `c` and `T[d][c]` the row of
//! the `d`-th one. Each level then costs one comparison instead of `n` subtractions.
//!
//! The lookup table costs `n x k` entries; entries with `d >= h[c]` are never read and
//! hold `-1`.

use crate::bits::RandomBits;
use crate::error::{check_levels, FormatError};
use crate::matrix::ProbabilityMatrix;
use crate::table::Table;

/// Leaf counts and leaf lookup table derived from a [`ProbabilityMatrix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMatrix {
    h: Vec<u32>,
    t: Table<i64>,
    k: usize,
    l: usize,
}

impl CachedMatrix {
    /// Validate a precomputed lookup.
    ///
    /// `t` has one row per outcome and `k` columns; for every `d < h[c]`, `t[d][c]`
    /// must be a row index.
    pub fn new(h: Vec<u32>, t: Table<i64>, k: usize, l: usize) -> Result<Self, FormatError> {
        if h.len() != k {
            return Err(FormatError::ShapeMismatch {
                what: "leaf count length",
                expected: k,
                found: h.len(),
            });
        }
        if t.cols() != k {
            return Err(FormatError::ShapeMismatch {
                what: "lookup columns",
                expected: k,
                found: t.cols(),
            });
        }

        let n = t.rows();
        for (column, &leaves) in h.iter().enumerate() {
            let leaves = leaves as usize;
            if leaves > n {
                return Err(FormatError::ShapeMismatch {
                    what: "leaves in lookup column",
                    expected: n,
                    found: leaves,
                });
            }
            for depth in 0..leaves {
                let value = *t.get(depth, column);
                if value < 0 || value as usize >= n {
                    return Err(FormatError::InvalidLookup {
                        depth,
                        column,
                        value,
                    });
                }
            }
        }

        let leaves: Vec<u64> = h.iter().map(|&x| u64::from(x)).collect();
        check_levels(&leaves, l)?;
        Ok(Self { h, t, k, l })
    }

    /// Tabulate the leaves of `matrix`.
    pub fn from_matrix(matrix: &ProbabilityMatrix) -> Self {
        Self {
            h: matrix.hamming_vector(),
            t: tabulate(matrix.table()),
            k: matrix.k(),
            l: matrix.l(),
        }
    }

    /// Number of outcomes.
    pub fn outcomes(&self) -> usize {
        self.t.rows()
    }

    /// Length of the expansion.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Column the traversal resumes at after column `k - 1`.
    pub fn l(&self) -> usize {
        self.l
    }

    /// Leaf count per level.
    pub fn hamming_vector(&self) -> &[u32] {
        &self.h
    }

    /// Leaf lookup table.
    pub fn table(&self) -> &Table<i64> {
        &self.t
    }

    /// Draw one outcome label (1-based).
    #[inline]
    pub fn sample<B: RandomBits + ?Sized>(&self, bits: &mut B) -> usize {
        if self.t.rows() == 1 {
            return 1;
        }

        let mut c = 0usize;
        let mut d = 0usize;
        loop {
            let b = usize::from(bits.next_bit());
            d = 2 * d + (1 - b);
            let h = self.h[c] as usize;
            if d < h {
                return *self.t.get(d, c) as usize + 1;
            }
            d -= h;
            c = if c == self.k - 1 { self.l } else { c + 1 };
        }
    }
}

/// `T[d][c]` = row of the `d`-th one in column `c`, `-1` past the last one.
fn tabulate(p: &Table<u32>) -> Table<i64> {
    let (n, k) = (p.rows(), p.cols());
    let mut t = Table::filled(n, k, -1i64);
    for c in 0..k {
        let ones = p.column(c).enumerate().filter(|&(_, v)| v == 1);
        for (d, (r, _)) in ones.enumerate() {
            *t.get_mut(d, c) = r as i64;
        }
    }
    t
}
