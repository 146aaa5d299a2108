//! Text formats for the three representations.
//!
//! Every file is a stream of whitespace-separated decimal integers:
//!
//! - encoding: `n k`, then an array (`len` followed by `len` entries);
//! - matrix: `k l`, then a matrix (`rows cols` followed by the entries, row-major);
//! - cached matrix: `k l`, then an array for `h`, then a matrix for `T`.
//!
//! Readers validate the structure before handing anything to a sampler.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::{FromStr, SplitAsciiWhitespace};

use log::debug;

use crate::cached::CachedMatrix;
use crate::encoding::EncodingTree;
use crate::error::FormatError;
use crate::matrix::ProbabilityMatrix;
use crate::table::Table;

/// Errors from reading a representation.
#[derive(Debug)]
pub enum LoadError {
    /// Reading the file failed.
    Io(io::Error),
    /// A token that is not an integer of the expected kind.
    Parse { what: &'static str, token: String },
    /// Input ended before `what` was read.
    UnexpectedEof { what: &'static str },
    /// Tokens left after the representation was complete.
    TrailingData { token: String },
    /// The numbers parsed, but do not describe a valid representation.
    Format(FormatError),
    /// A sampler key other than `ky.enc`, `ky.mat`, `ky.matc`.
    UnknownSampler(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "read failed: {e}"),
            Self::Parse { what, token } => write!(f, "bad {what}: {token:?}"),
            Self::UnexpectedEof { what } => write!(f, "input ended before {what}"),
            Self::TrailingData { token } => write!(f, "unexpected trailing data at {token:?}"),
            Self::Format(e) => write!(f, "malformed distribution: {e}"),
            Self::UnknownSampler(key) => {
                write!(f, "unknown sampler {key:?} (expected ky.enc, ky.mat or ky.matc)")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FormatError> for LoadError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

struct Tokens<'a> {
    inner: SplitAsciiWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_ascii_whitespace(),
        }
    }

    fn next<T: FromStr>(&mut self, what: &'static str) -> Result<T, LoadError> {
        let token = self.inner.next().ok_or(LoadError::UnexpectedEof { what })?;
        token.parse().map_err(|_| LoadError::Parse {
            what,
            token: token.to_string(),
        })
    }

    fn array<T: FromStr>(&mut self, what: &'static str) -> Result<Vec<T>, LoadError> {
        let len: usize = self.next("array length")?;
        (0..len).map(|_| self.next(what)).collect()
    }

    fn table<T: FromStr>(&mut self, what: &'static str) -> Result<Table<T>, LoadError> {
        let rows: usize = self.next("row count")?;
        let cols: usize = self.next("column count")?;
        let len = rows.checked_mul(cols).ok_or(LoadError::Parse {
            what: "matrix shape",
            token: format!("{rows} {cols}"),
        })?;
        let data = (0..len)
            .map(|_| self.next(what))
            .collect::<Result<Vec<T>, _>>()?;
        Ok(Table::new(rows, cols, data)?)
    }

    fn finish(mut self) -> Result<(), LoadError> {
        match self.inner.next() {
            Some(token) => Err(LoadError::TrailingData {
                token: token.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Parse an encoding file.
pub fn parse_encoding(text: &str) -> Result<EncodingTree, LoadError> {
    let mut tokens = Tokens::new(text);
    let n = tokens.next("outcome count")?;
    let k = tokens.next("k")?;
    let enc = tokens.array("tree entry")?;
    tokens.finish()?;
    Ok(EncodingTree::new(enc, n, k)?)
}

/// Parse a matrix file.
pub fn parse_matrix(text: &str) -> Result<ProbabilityMatrix, LoadError> {
    let mut tokens = Tokens::new(text);
    let k = tokens.next("k")?;
    let l = tokens.next("l")?;
    let p = tokens.table("matrix entry")?;
    tokens.finish()?;
    Ok(ProbabilityMatrix::new(p, k, l)?)
}

/// Parse a cached-matrix file.
pub fn parse_cached(text: &str) -> Result<CachedMatrix, LoadError> {
    let mut tokens = Tokens::new(text);
    let k = tokens.next("k")?;
    let l = tokens.next("l")?;
    let h = tokens.array("leaf count")?;
    let t = tokens.table("lookup entry")?;
    tokens.finish()?;
    Ok(CachedMatrix::new(h, t, k, l)?)
}

/// Read and validate an encoding file.
pub fn load_encoding(path: impl AsRef<Path>) -> Result<EncodingTree, LoadError> {
    let path = path.as_ref();
    let tree = parse_encoding(&fs::read_to_string(path)?)?;
    debug!(
        "loaded encoding from {}: n={} k={} len={}",
        path.display(),
        tree.outcomes(),
        tree.k(),
        tree.as_slice().len()
    );
    Ok(tree)
}

/// Read and validate a matrix file.
pub fn load_matrix(path: impl AsRef<Path>) -> Result<ProbabilityMatrix, LoadError> {
    let path = path.as_ref();
    let matrix = parse_matrix(&fs::read_to_string(path)?)?;
    debug!(
        "loaded matrix from {}: n={} k={} l={}",
        path.display(),
        matrix.outcomes(),
        matrix.k(),
        matrix.l()
    );
    Ok(matrix)
}

/// Read and validate a cached-matrix file.
pub fn load_cached(path: impl AsRef<Path>) -> Result<CachedMatrix, LoadError> {
    let path = path.as_ref();
    let cached = parse_cached(&fs::read_to_string(path)?)?;
    debug!(
        "loaded cached matrix from {}: n={} k={} l={}",
        path.display(),
        cached.outcomes(),
        cached.k(),
        cached.l()
    );
    Ok(cached)
}

fn write_array<T: std::fmt::Display, W: Write>(items: &[T], out: &mut W) -> io::Result<()> {
    write!(out, "{} ", items.len())?;
    write_row(items, out)
}

fn write_table<T: std::fmt::Display, W: Write>(t: &Table<T>, out: &mut W) -> io::Result<()> {
    writeln!(out, "{} {}", t.rows(), t.cols())?;
    for row in t.iter_rows() {
        write_row(row, out)?;
    }
    Ok(())
}

fn write_row<T: std::fmt::Display, W: Write>(items: &[T], out: &mut W) -> io::Result<()> {
    for (i, x) in items.iter().enumerate() {
        if i > 0 {
            out.write_all(b" ")?;
        }
        write!(out, "{x}")?;
    }
    out.write_all(b"\n")
}

/// Write `tree` in the format [`parse_encoding`] reads.
pub fn write_encoding<W: Write>(tree: &EncodingTree, mut out: W) -> io::Result<()> {
    writeln!(out, "{} {}", tree.outcomes(), tree.k())?;
    write_array(tree.as_slice(), &mut out)
}

/// Write `matrix` in the format [`parse_matrix`] reads.
pub fn write_matrix<W: Write>(matrix: &ProbabilityMatrix, mut out: W) -> io::Result<()> {
    writeln!(out, "{} {}", matrix.k(), matrix.l())?;
    write_table(matrix.table(), &mut out)
}

/// Write `cached` in the format [`parse_cached`] reads.
pub fn write_cached<W: Write>(cached: &CachedMatrix, mut out: W) -> io::Result<()> {
    writeln!(out, "{} {}", cached.k(), cached.l())?;
    write_array(cached.hamming_vector(), &mut out)?;
    write_table(cached.table(), &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::ReplayBits;

    const MATRIX: &str = "4 0\n2 4\n0 0 1 1\n1 1 0 0\n";

    #[test]
    fn parses_matrix_file() {
        let m = parse_matrix(MATRIX).expect("valid file");
        assert_eq!((m.outcomes(), m.k(), m.l()), (2, 4, 0));
        assert_eq!(m.sample(&mut ReplayBits::new(&[0, 0, 1])), 1);
    }

    #[test]
    fn writes_what_it_reads() {
        let m = parse_matrix(MATRIX).expect("valid file");
        let mut buf = Vec::new();
        write_matrix(&m, &mut buf).expect("write to vec");
        assert_eq!(String::from_utf8(buf).expect("utf8"), MATRIX);

        let cached = CachedMatrix::from_matrix(&m);
        let mut buf = Vec::new();
        write_cached(&cached, &mut buf).expect("write to vec");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text, "4 0\n4 1 1 1 1\n2 4\n1 1 0 0\n-1 -1 -1 -1\n");
        assert_eq!(parse_cached(&text).expect("valid file"), cached);

        let tree = EncodingTree::from_matrix(&m);
        let mut buf = Vec::new();
        write_encoding(&tree, &mut buf).expect("write to vec");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text, "2 4\n12 3 2 -2 6 5 -2 9 8 -1 0 11 -1\n");
        assert_eq!(parse_encoding(&text).expect("valid file"), tree);
    }

    #[test]
    fn accepts_any_whitespace() {
        let tree = parse_encoding("2 1 4\t3 2\n\n-1 -2").expect("valid file");
        assert_eq!(tree.as_slice(), &[3, 2, -1, -2]);
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!(matches!(
            parse_matrix("4 x"),
            Err(LoadError::Parse { what: "l", .. })
        ));
        assert!(matches!(
            parse_matrix("1 0 2 1 1"),
            Err(LoadError::UnexpectedEof {
                what: "matrix entry"
            })
        ));
        assert!(matches!(
            parse_matrix("1 0 2 1 1 1 7"),
            Err(LoadError::TrailingData { .. })
        ));
        assert!(matches!(
            parse_encoding("1 1 -1 -1"),
            Err(LoadError::Parse {
                what: "array length",
                ..
            })
        ));
    }

    #[test]
    fn rejects_structural_errors() {
        let err = parse_matrix("2 2 2 2 1 0 0 1").expect_err("unterminated");
        assert!(matches!(
            err,
            LoadError::Format(FormatError::Unterminated { .. })
        ));
        assert!(std::error::Error::source(&err).is_some());

        assert!(matches!(
            parse_cached("2 2 2 2 1 2 2 0 0 1 -1"),
            Err(LoadError::Format(FormatError::ColumnOverflow { .. }))
        ));
    }

    #[test]
    fn loads_large_trees_in_linear_time() {
        // Uniform over 2^16 outcomes: 65535 internal nodes in a 196606-slot array.
        let tree = crate::construct::encoding_from_weights(&vec![1; 1 << 16]).expect("valid");
        let mut buf = Vec::new();
        write_encoding(&tree, &mut buf).expect("write to vec");
        let text = String::from_utf8(buf).expect("utf8");

        let start = std::time::Instant::now();
        let loaded = parse_encoding(&text).expect("valid file");
        let elapsed = start.elapsed();

        assert_eq!(loaded.as_slice().len(), 196_606);
        assert_eq!(loaded, tree);
        assert!(
            elapsed < std::time::Duration::from_secs(5),
            "parsing took {elapsed:?}"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_matrix("/nonexistent/knuth-yao/matrix.txt").expect_err("missing");
        assert!(matches!(err, LoadError::Io(_)));
    }
}
