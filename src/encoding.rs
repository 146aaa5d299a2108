//! Knuth-Yao sampling over a flattened DDG tree.
//!
//! The tree is stored as one array of integers. An internal node is a pair of slots at
//! some base position `p`: `enc[p]` is where bit `0` leads, `enc[p + 1]` where bit `1`
//! leads. A location `q` holding a negative value is a leaf with label `-enc[q]`;
//! any other location is the base of another internal node. The root's pair sits at
//! position 0.
//!
//! Periodic expansions give infinite trees. Their repeating part is folded into back
//! edges: the internal nodes below the last level point back to the internal nodes
//! that enter level `l`.
//!
//! Layout of `3/15, 12/15` (`0.(0011)`, `0.(1100)`):
//!
//! ```text
//! pos:  0  1  2  3  4  5  6  7  8  9 10 11
//! enc:  3  2 -2  6  5 -2  9  8 -1  0 11 -1
//! ```
//!
//! A tree with a single outcome is the one-slot array `[-1]`.

use crate::bits::RandomBits;
use crate::error::FormatError;
use crate::matrix::ProbabilityMatrix;

/// A flattened DDG tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingTree {
    enc: Vec<i64>,
    n: usize,
    k: usize,
}

impl EncodingTree {
    /// Validate a flattened tree over `n` outcomes with `k` levels before its first
    /// back edge.
    ///
    /// Every slot reachable from the root must point inside the array, every leaf must
    /// carry a label in `1..=n`, and a leaf must be reachable from every internal node.
    pub fn new(enc: Vec<i64>, n: usize, k: usize) -> Result<Self, FormatError> {
        match enc.len() {
            0 => return Err(FormatError::Empty),
            1 => {
                if enc[0] != -1 {
                    return Err(FormatError::InvalidLabel {
                        position: 0,
                        label: enc[0].saturating_neg(),
                    });
                }
                if n != 1 {
                    return Err(FormatError::ShapeMismatch {
                        what: "outcomes of a single-leaf tree",
                        expected: 1,
                        found: n,
                    });
                }
            }
            _ => check_tree(&enc, n)?,
        }
        Ok(Self { enc, n, k })
    }

    /// Unfold the tree that `matrix` walks implicitly.
    ///
    /// Node numbering follows the matrix traversal: at each level the children of the
    /// `j`-th internal node are nodes `2j` (bit 1) and `2j + 1` (bit 0), the first
    /// `h[c]` nodes are leaves in row order, and the rest are internal in order. The
    /// resulting tree returns the same outcome as the matrix for every bit sequence.
    pub fn from_matrix(matrix: &ProbabilityMatrix) -> Self {
        let p = matrix.table();
        let (n, k, l) = (matrix.outcomes(), matrix.k(), matrix.l());
        if n == 1 {
            return Self { enc: vec![-1], n, k };
        }

        let mut enc: Vec<i64> = vec![0, 0];
        let mut parents: Vec<usize> = vec![0];
        let mut entering: Vec<usize> = Vec::new();

        for c in 0..k {
            if parents.is_empty() {
                break;
            }
            if c == l {
                entering = parents.clone();
            }

            let leaves: Vec<usize> = p
                .column(c)
                .enumerate()
                .filter(|&(_, v)| v == 1)
                .map(|(r, _)| r)
                .collect();

            let mut children = Vec::with_capacity(2 * parents.len());
            let mut next = Vec::new();
            for d in 0..2 * parents.len() {
                let loc = if let Some(&row) = leaves.get(d) {
                    enc.push(-(row as i64 + 1));
                    enc.len() - 1
                } else if c == k - 1 {
                    entering[d - leaves.len()]
                } else {
                    let base = enc.len();
                    enc.extend([0, 0]);
                    next.push(base);
                    base
                };
                children.push(loc);
            }

            for (j, &base) in parents.iter().enumerate() {
                enc[base] = children[2 * j + 1] as i64;
                enc[base + 1] = children[2 * j] as i64;
            }
            parents = next;
        }

        Self { enc, n, k }
    }

    /// Number of outcomes.
    pub fn outcomes(&self) -> usize {
        self.n
    }

    /// Depth of the non-repeating part of the tree.
    pub fn k(&self) -> usize {
        self.k
    }

    /// The flattened array, root pair first.
    pub fn as_slice(&self) -> &[i64] {
        &self.enc
    }

    /// Draw one outcome label (1-based).
    #[inline]
    pub fn sample<B: RandomBits + ?Sized>(&self, bits: &mut B) -> usize {
        if self.enc.len() == 1 {
            return 1;
        }

        let mut c = 0usize;
        loop {
            let b = usize::from(bits.next_bit());
            c = self.enc[c + b] as usize;
            let v = self.enc[c];
            if v < 0 {
                return (-v) as usize;
            }
        }
    }
}

fn check_tree(enc: &[i64], n: usize) -> Result<(), FormatError> {
    let len = enc.len();

    // Internal nodes reachable from the root, and the internal nodes leading into each.
    let mut seen = vec![false; len];
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); len];
    let mut live = vec![false; len];
    let mut frontier = Vec::new();
    let mut stack = vec![0usize];
    seen[0] = true;

    while let Some(base) = stack.pop() {
        for position in [base, base + 1] {
            let index = enc[position];
            if index < 0 || index as usize >= len {
                return Err(FormatError::IndexOutOfBounds { position, index });
            }
            let loc = index as usize;
            let v = enc[loc];
            if v < 0 {
                if v.unsigned_abs() > n as u64 {
                    return Err(FormatError::InvalidLabel {
                        position: loc,
                        label: -v,
                    });
                }
                if !live[base] {
                    live[base] = true;
                    frontier.push(base);
                }
                continue;
            }
            if loc + 1 >= len {
                return Err(FormatError::IndexOutOfBounds { position, index });
            }
            parents[loc].push(base);
            if !seen[loc] {
                seen[loc] = true;
                stack.push(loc);
            }
        }
    }

    // Walk parent links back from the nodes that have a leaf child.
    while let Some(node) = frontier.pop() {
        for &from in &parents[node] {
            if !live[from] {
                live[from] = true;
                frontier.push(from);
            }
        }
    }

    match (0..len).find(|&position| seen[position] && !live[position]) {
        Some(position) => Err(FormatError::NoLeafReachable { position }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{BitSource, ReplayBits};
    use crate::table::Table;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn matrix(rows: Vec<Vec<u32>>, k: usize, l: usize) -> ProbabilityMatrix {
        ProbabilityMatrix::new(Table::from_rows(rows).expect("shape ok"), k, l).expect("valid")
    }

    #[test]
    fn periodic_tree_has_one_back_edge() {
        let m = matrix(vec![vec![0, 0, 1, 1], vec![1, 1, 0, 0]], 4, 0);
        let tree = EncodingTree::from_matrix(&m);
        assert_eq!(
            tree.as_slice(),
            &[3, 2, -2, 6, 5, -2, 9, 8, -1, 0, 11, -1]
        );

        let enc = tree.as_slice();
        let back_edges: Vec<i64> = enc
            .iter()
            .enumerate()
            .filter(|&(pos, &v)| v >= 0 && (v as usize) < pos)
            .map(|(_, &v)| v)
            .collect();
        assert_eq!(back_edges, vec![0]);
        assert_eq!(enc.iter().filter(|&&v| v == -1).count(), 2);
        assert_eq!(enc.iter().filter(|&&v| v == -2).count(), 2);

        assert!(EncodingTree::new(enc.to_vec(), 2, 4).is_ok());
    }

    #[test]
    fn follows_the_matrix_bit_for_bit() {
        let m = matrix(vec![vec![0, 0, 1, 1], vec![1, 1, 0, 0]], 4, 0);
        let tree = EncodingTree::from_matrix(&m);

        let mut a = BitSource::new(ChaCha8Rng::seed_from_u64(17));
        let mut b = BitSource::new(ChaCha8Rng::seed_from_u64(17));
        for _ in 0..5_000 {
            assert_eq!(tree.sample(&mut a), m.sample(&mut b));
        }
        assert_eq!(a.rng_calls(), b.rng_calls());
    }

    #[test]
    fn fair_coin() {
        let tree = EncodingTree::new(vec![3, 2, -1, -2], 2, 1).expect("valid");
        assert_eq!(tree.sample(&mut ReplayBits::new(&[1])), 1);
        assert_eq!(tree.sample(&mut ReplayBits::new(&[0])), 2);
    }

    #[test]
    fn single_outcome_draws_no_bits() {
        let tree = EncodingTree::from_matrix(&matrix(vec![vec![1]], 1, 0));
        assert_eq!(tree.as_slice(), &[-1]);
        let mut bits = ReplayBits::new(&[]);
        assert_eq!(tree.sample(&mut bits), 1);
        assert_eq!(bits.consumed(), 0);
    }

    #[test]
    fn self_wrap_tree() {
        let m = matrix(vec![vec![1, 0], vec![0, 1]], 2, 1);
        let tree = EncodingTree::from_matrix(&m);
        assert!(EncodingTree::new(tree.as_slice().to_vec(), 2, 2).is_ok());

        let mut bits = ReplayBits::new(&[0, 0, 0, 0, 1]);
        assert_eq!(tree.sample(&mut bits), 2);
        assert_eq!(bits.consumed(), 5);
    }

    #[test]
    fn rejects_malformed_trees() {
        assert_eq!(EncodingTree::new(vec![], 1, 1), Err(FormatError::Empty));
        assert_eq!(
            EncodingTree::new(vec![-2], 1, 1),
            Err(FormatError::InvalidLabel {
                position: 0,
                label: 2
            })
        );
        assert_eq!(
            EncodingTree::new(vec![7, 2, -1], 1, 1),
            Err(FormatError::IndexOutOfBounds {
                position: 0,
                index: 7
            })
        );
        assert_eq!(
            EncodingTree::new(vec![2, 3, -1, -3], 2, 1),
            Err(FormatError::InvalidLabel {
                position: 3,
                label: 3
            })
        );
        // Node at 2 only ever leads back to itself.
        assert_eq!(
            EncodingTree::new(vec![2, 4, 2, 2, -1], 1, 2),
            Err(FormatError::NoLeafReachable { position: 2 })
        );
        // A lone leaf is outcome 1 of exactly one.
        assert_eq!(
            EncodingTree::new(vec![-1], 0, 1),
            Err(FormatError::ShapeMismatch {
                what: "outcomes of a single-leaf tree",
                expected: 1,
                found: 0
            })
        );
        assert!(matches!(
            EncodingTree::new(vec![-1], 7, 1),
            Err(FormatError::ShapeMismatch { found: 7, .. })
        ));
        assert_eq!(
            EncodingTree::new(vec![-1], 1, 1).expect("valid").outcomes(),
            1
        );
        // Internal node whose pair would run off the end.
        assert_eq!(
            EncodingTree::new(vec![2, 3, 0], 1, 1),
            Err(FormatError::IndexOutOfBounds {
                position: 0,
                index: 2
            })
        );
    }
}
