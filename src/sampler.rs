//! One sampler, chosen once.

use std::path::Path;
use std::str::FromStr;

use crate::bits::RandomBits;
use crate::cached::CachedMatrix;
use crate::encoding::EncodingTree;
use crate::io::{self, LoadError};
use crate::matrix::ProbabilityMatrix;

/// Which representation a sampler walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Flattened tree (`ky.enc`).
    Encoding,
    /// Probability matrix with row scan (`ky.mat`).
    Matrix,
    /// Probability matrix with leaf lookup (`ky.matc`).
    MatrixCached,
}

impl SamplerKind {
    /// Every kind, in file-extension order of `kybench build`.
    pub const ALL: [SamplerKind; 3] = [Self::Encoding, Self::Matrix, Self::MatrixCached];

    /// Key used on the command line and in reports.
    pub fn key(self) -> &'static str {
        match self {
            Self::Encoding => "ky.enc",
            Self::Matrix => "ky.mat",
            Self::MatrixCached => "ky.matc",
        }
    }

    /// File extension used by `kybench build`.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Encoding => "enc",
            Self::Matrix => "mat",
            Self::MatrixCached => "matc",
        }
    }
}

impl std::fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SamplerKind {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| LoadError::UnknownSampler(s.to_string()))
    }
}

/// A loaded representation together with the sampler that walks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sampler {
    Encoding(EncodingTree),
    Matrix(ProbabilityMatrix),
    MatrixCached(CachedMatrix),
}

impl Sampler {
    /// Read the file format that belongs to `kind`.
    pub fn load(kind: SamplerKind, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Ok(match kind {
            SamplerKind::Encoding => Self::Encoding(io::load_encoding(path)?),
            SamplerKind::Matrix => Self::Matrix(io::load_matrix(path)?),
            SamplerKind::MatrixCached => Self::MatrixCached(io::load_cached(path)?),
        })
    }

    /// Which representation this is.
    pub fn kind(&self) -> SamplerKind {
        match self {
            Self::Encoding(_) => SamplerKind::Encoding,
            Self::Matrix(_) => SamplerKind::Matrix,
            Self::MatrixCached(_) => SamplerKind::MatrixCached,
        }
    }

    /// Number of outcomes.
    pub fn outcomes(&self) -> usize {
        match self {
            Self::Encoding(x) => x.outcomes(),
            Self::Matrix(x) => x.outcomes(),
            Self::MatrixCached(x) => x.outcomes(),
        }
    }

    /// Draw one outcome label (1-based).
    #[inline]
    pub fn sample<B: RandomBits + ?Sized>(&self, bits: &mut B) -> usize {
        match self {
            Self::Encoding(x) => x.sample(bits),
            Self::Matrix(x) => x.sample(bits),
            Self::MatrixCached(x) => x.sample(bits),
        }
    }
}

impl From<EncodingTree> for Sampler {
    fn from(x: EncodingTree) -> Self {
        Self::Encoding(x)
    }
}

impl From<ProbabilityMatrix> for Sampler {
    fn from(x: ProbabilityMatrix) -> Self {
        Self::Matrix(x)
    }
}

impl From<CachedMatrix> for Sampler {
    fn from(x: CachedMatrix) -> Self {
        Self::MatrixCached(x)
    }
}
