//! Structural errors in a distribution representation.

/// A representation that would make a sampler read out of bounds or loop forever.
///
/// These are raised when a representation is constructed (or loaded), never while
/// sampling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A table with no rows or no columns.
    Empty,
    /// Row-major data whose length is not `rows * cols`.
    DataLength { rows: usize, cols: usize, len: usize },
    /// A dimension that disagrees with the declared one.
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// `l` must lie in `0..=k`, and `k` must be at least 1.
    InvalidPeriod { k: usize, l: usize },
    /// Matrix entries are binary digits.
    NonBinaryEntry { row: usize, col: usize, value: u32 },
    /// A column holds more leaves than there are nodes at its level.
    ColumnOverflow {
        column: usize,
        leaves: u64,
        nodes: u64,
    },
    /// `l == k` but internal nodes remain after the last column.
    Unterminated { internal: u64 },
    /// The last column does not lead back to as many nodes as enter column `l`.
    PeriodMismatch {
        l: usize,
        expected: u64,
        found: u64,
    },
    /// The node count at some level does not fit the depth counter.
    DepthOverflow { column: usize },
    /// An encoding slot points outside the array.
    IndexOutOfBounds { position: usize, index: i64 },
    /// A leaf whose label is not in `1..=n`.
    InvalidLabel { position: usize, label: i64 },
    /// An internal node from which no leaf can be reached.
    NoLeafReachable { position: usize },
    /// A cached lookup entry that is not a row index.
    InvalidLookup { depth: usize, column: usize, value: i64 },
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "table has no entries"),
            Self::DataLength { rows, cols, len } => {
                write!(f, "expected {rows}x{cols} entries, got {len}")
            }
            Self::ShapeMismatch {
                what,
                expected,
                found,
            } => write!(f, "{what}: expected {expected}, found {found}"),
            Self::InvalidPeriod { k, l } => {
                write!(f, "invalid expansion shape k={k} l={l} (need k >= 1, l <= k)")
            }
            Self::NonBinaryEntry { row, col, value } => {
                write!(f, "entry ({row}, {col}) must be 0 or 1 (got {value})")
            }
            Self::ColumnOverflow {
                column,
                leaves,
                nodes,
            } => write!(
                f,
                "column {column} has {leaves} leaves but only {nodes} nodes"
            ),
            Self::Unterminated { internal } => write!(
                f,
                "expansion marked terminating but {internal} internal nodes remain"
            ),
            Self::PeriodMismatch { l, expected, found } => write!(
                f,
                "periodic tail returns {found} nodes to column {l}, expected {expected}"
            ),
            Self::DepthOverflow { column } => {
                write!(f, "node count overflows at column {column}")
            }
            Self::IndexOutOfBounds { position, index } => {
                write!(f, "slot {position} points to {index}, outside the encoding")
            }
            Self::InvalidLabel { position, label } => {
                write!(f, "leaf at {position} has invalid label {label}")
            }
            Self::NoLeafReachable { position } => {
                write!(f, "no leaf reachable from node at {position}")
            }
            Self::InvalidLookup {
                depth,
                column,
                value,
            } => write!(
                f,
                "lookup entry ({depth}, {column}) is {value}, not a row index"
            ),
        }
    }
}

impl std::error::Error for FormatError {}

/// Walk the level structure implied by per-column leaf counts.
///
/// Level `c` has twice as many nodes as there were internal nodes at level `c - 1`
/// (one internal node, the root, before level 0); the first `leaves[c]` of them are
/// leaves. Returns the internal node count after every level.
///
/// The last level must either end the tree (`l == k`, or no internal nodes left) or
/// hand back exactly as many internal nodes as enter level `l`, so that the wrap from
/// column `k - 1` to column `l` continues the same tree.
pub(crate) fn check_levels(leaves: &[u64], l: usize) -> Result<Vec<u64>, FormatError> {
    let k = leaves.len();
    if k == 0 || l > k {
        return Err(FormatError::InvalidPeriod { k, l });
    }

    let mut internal = Vec::with_capacity(k);
    let mut current = 1u64;
    for (column, &h) in leaves.iter().enumerate() {
        let nodes = current
            .checked_mul(2)
            .filter(|&n| n <= i64::MAX as u64 / 2)
            .ok_or(FormatError::DepthOverflow { column })?;
        if h > nodes {
            return Err(FormatError::ColumnOverflow {
                column,
                leaves: h,
                nodes,
            });
        }
        current = nodes - h;
        internal.push(current);
    }

    if current == 0 {
        return Ok(internal);
    }
    if l == k {
        return Err(FormatError::Unterminated { internal: current });
    }
    let entering = if l == 0 { 1 } else { internal[l - 1] };
    if current != entering {
        return Err(FormatError::PeriodMismatch {
            l,
            expected: entering,
            found: current,
        });
    }
    Ok(internal)
}
