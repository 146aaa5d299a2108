//! Row-major 2-D storage with an explicit shape.

use crate::error::FormatError;

/// An owned `rows x cols` table stored in one contiguous buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Table<T> {
    /// Wrap row-major `data` of shape `rows x cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, FormatError> {
        if rows == 0 || cols == 0 {
            return Err(FormatError::Empty);
        }
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(FormatError::DataLength {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows, which must all have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, FormatError> {
        let n = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n * cols);
        for row in rows {
            if row.len() != cols {
                return Err(FormatError::ShapeMismatch {
                    what: "row length",
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend(row);
        }
        Self::new(n, cols, data)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Entry at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &T {
        assert!(col < self.cols, "Table: column {col} out of range");
        &self.data[row * self.cols + col]
    }

    /// Row `row` as a slice.
    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Rows in order, each as a slice.
    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.cols)
    }

    /// Row-major entries.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Copy> Table<T> {
    /// A `rows x cols` table with every entry set to `value`; callers pass a non-empty shape.
    pub(crate) fn filled(rows: usize, cols: usize, value: T) -> Self {
        debug_assert!(rows > 0 && cols > 0);
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        assert!(col < self.cols, "Table: column {col} out of range");
        &mut self.data[row * self.cols + col]
    }

    /// Column `col`, top to bottom.
    pub fn column(&self, col: usize) -> impl Iterator<Item = T> + '_ {
        self.data[col..].iter().step_by(self.cols).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_indexing() {
        let t = Table::new(2, 3, vec![1, 2, 3, 4, 5, 6]).expect("shape ok");
        assert_eq!(*t.get(0, 2), 3);
        assert_eq!(*t.get(1, 0), 4);
        assert_eq!(t.row(1), &[4, 5, 6]);
        assert_eq!(t.column(1).collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(t.iter_rows().count(), 2);
    }

    #[test]
    fn from_rows_matches_new() {
        let a = Table::from_rows(vec![vec![1, 0], vec![0, 1]]).expect("shape ok");
        let b = Table::new(2, 2, vec![1, 0, 0, 1]).expect("shape ok");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_ragged_and_empty() {
        let err = Table::from_rows(vec![vec![1, 0], vec![1]]).expect_err("ragged");
        assert!(matches!(err, FormatError::ShapeMismatch { found: 1, .. }));
        assert_eq!(Table::<u32>::from_rows(vec![]), Err(FormatError::Empty));
        assert_eq!(
            Table::new(2, 2, vec![1, 2, 3]),
            Err(FormatError::DataLength {
                rows: 2,
                cols: 2,
                len: 3
            })
        );
    }
}
