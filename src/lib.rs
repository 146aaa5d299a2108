//! `knuth-yao`: exact sampling from discrete distributions with fair coin flips.
//!
//! A distribution with rational probabilities is sampled exactly, and with close to the
//! minimum possible number of random bits, by walking its DDG ("discrete distribution
//! generating") tree one bit at a time (Knuth & Yao, 1976). This crate ships three
//! interchangeable representations of the same tree; for every bit sequence they return
//! the same outcome.
//!
//! Exposed modules:
//! - `bits`: lazily buffered fair bits over any `rand::RngCore`, plus bit replay.
//! - `encoding`: the tree flattened into one integer array.
//! - `matrix`: the matrix of binary expansions, scanned one column per bit.
//! - `cached`: the matrix with a precomputed leaf lookup per column.
//! - `sampler`: one closed enum over the three representations.
//! - `construct`: build all three from integer weights.
//! - `approx`: closest integer weights to real-valued probabilities at a fixed precision.
//! - `io`: the plain-text file formats.
//! - `bench`: the timing harness behind `kybench`.
//!
//! ```
//! use knuth_yao::{construct, BitSource};
//! use rand::SeedableRng;
//! use rand_xoshiro::Xoshiro256StarStar;
//!
//! let tree = construct::encoding_from_weights(&[1, 3, 4, 2]).unwrap();
//! let mut bits = BitSource::new(Xoshiro256StarStar::seed_from_u64(1));
//! let label = tree.sample(&mut bits);
//! assert!((1..=4).contains(&label));
//! ```

#![forbid(unsafe_code)]

pub mod approx;
pub mod bench;
pub mod bits;
pub mod cached;
pub mod construct;
pub mod encoding;
pub mod error;
pub mod io;
pub mod matrix;
pub mod sampler;
pub mod table;

pub use approx::{approximate, approximate_within, ApproxError, Approximation, Divergence};
pub use bits::{BitSource, RandomBits, ReplayBits};
pub use cached::CachedMatrix;
pub use construct::{
    cached_from_weights, encoding_from_weights, matrix_from_weights, ConstructError,
};
pub use encoding::EncodingTree;
pub use error::FormatError;
pub use io::LoadError;
pub use matrix::ProbabilityMatrix;
pub use sampler::{Sampler, SamplerKind};
pub use table::Table;
