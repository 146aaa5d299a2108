//! Timing harness behind the `kybench` binary.
//!
//! A run loads one representation, seeds a [`BitSource`], draws `steps` outcomes and
//! reports the process CPU time spent drawing together with the number of generator
//! words consumed. Wall-clock time is kept alongside for comparison.
//! Outcomes are summed into a checksum so the loop cannot be optimized away; since all
//! three samplers walk the same tree, the checksum and word count of a seed agree
//! across representations of one distribution.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use cpu_time::ProcessTime;
use log::{debug, info};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::Deserialize;

use crate::bits::BitSource;
use crate::cached::CachedMatrix;
use crate::construct::{matrix_from_weights, ConstructError};
use crate::encoding::EncodingTree;
use crate::io::{write_cached, write_encoding, write_matrix, LoadError};
use crate::sampler::{Sampler, SamplerKind};

fn default_steps() -> u64 {
    1_000_000
}

fn default_sampler() -> String {
    SamplerKind::Encoding.key().to_string()
}

fn default_word_width() -> u32 {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings for one timing run, usually read from TOML.
///
/// ```toml
/// seed = 1
/// steps = 1000000
/// sampler = "ky.matc"
/// path = "dist.matc"
/// word_width = 31
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default)]
    seed: u64,
    #[serde(default = "default_steps")]
    steps: u64,
    #[serde(default = "default_sampler")]
    sampler: String,
    #[serde(default)]
    path: Option<PathBuf>,
    /// Usable bits per generator word.
    #[serde(default = "default_word_width")]
    word_width: u32,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            steps: default_steps(),
            sampler: default_sampler(),
            path: None,
            word_width: default_word_width(),
            log_level: default_log_level(),
        }
    }
}

impl BenchConfig {
    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, BenchError> {
        toml::from_str(text).map_err(BenchError::Config)
    }

    /// Seed of the bit source's generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of draws to time.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Sampler key, parsed when the run starts.
    pub fn with_sampler(mut self, key: impl Into<String>) -> Self {
        self.sampler = key.into();
        self
    }

    /// Distribution file to load.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Usable bits per generator word, `1..=32`.
    pub fn with_word_width(mut self, word_width: u32) -> Self {
        self.word_width = word_width;
        self
    }

    /// Level name for the binary's logger.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Generator seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of draws.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The configured sampler kind; fails on an unknown key.
    pub fn sampler(&self) -> Result<SamplerKind, LoadError> {
        self.sampler.parse()
    }

    /// Distribution file, if one was given.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Usable bits per generator word.
    pub fn word_width(&self) -> u32 {
        self.word_width
    }

    /// Log level name.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Result of one timing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchReport {
    pub kind: SamplerKind,
    pub steps: u64,
    /// CPU time of the whole process while drawing.
    pub cpu_time: Duration,
    pub wall_time: Duration,
    pub rng_calls: u64,
    pub checksum: u64,
}

impl std::fmt::Display for BenchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:.5} {}",
            self.kind,
            self.cpu_time.as_secs_f64(),
            self.rng_calls
        )
    }
}

/// Errors from the harness.
#[derive(Debug)]
pub enum BenchError {
    Io(io::Error),
    Config(toml::de::Error),
    Load(LoadError),
    Construct(ConstructError),
    /// No data file in the config or on the command line.
    MissingPath,
    /// Word width outside `1..=32`.
    InvalidWordWidth(u32),
}

impl std::fmt::Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "invalid config: {e}"),
            Self::Load(e) => write!(f, "{e}"),
            Self::Construct(e) => write!(f, "{e}"),
            Self::MissingPath => write!(f, "no distribution file given"),
            Self::InvalidWordWidth(w) => write!(f, "word width must be in 1..=32 (got {w})"),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Load(e) => Some(e),
            Self::Construct(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BenchError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<LoadError> for BenchError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<ConstructError> for BenchError {
    fn from(e: ConstructError) -> Self {
        Self::Construct(e)
    }
}

/// Load the configured representation and time it.
pub fn run(config: &BenchConfig) -> Result<BenchReport, BenchError> {
    let kind = config.sampler()?;
    let path = config.path().ok_or(BenchError::MissingPath)?;
    let sampler = Sampler::load(kind, path)?;
    info!(
        "{} outcomes from {} ({kind})",
        sampler.outcomes(),
        path.display()
    );
    run_loaded(&sampler, config)
}

/// Time `config.steps()` draws from an already loaded sampler.
pub fn run_loaded(sampler: &Sampler, config: &BenchConfig) -> Result<BenchReport, BenchError> {
    let width = config.word_width();
    if !(1..=32).contains(&width) {
        return Err(BenchError::InvalidWordWidth(width));
    }
    let mut bits =
        BitSource::with_word_width(Xoshiro256StarStar::seed_from_u64(config.seed()), width);

    debug!(
        "seed={} steps={} word_width={width}",
        config.seed(),
        config.steps()
    );
    let cpu_start = ProcessTime::try_now()?;
    let wall_start = Instant::now();
    let mut checksum = 0u64;
    for _ in 0..config.steps() {
        checksum = checksum.wrapping_add(sampler.sample(&mut bits) as u64);
    }
    let wall_time = wall_start.elapsed();
    let cpu_time = cpu_start.try_elapsed()?;
    debug!(
        "cpu {:.5}s wall {:.5}s",
        cpu_time.as_secs_f64(),
        wall_time.as_secs_f64()
    );

    Ok(BenchReport {
        kind: sampler.kind(),
        steps: config.steps(),
        cpu_time,
        wall_time,
        rng_calls: bits.rng_calls(),
        checksum,
    })
}

/// Write all three representations of `weights` next to `prefix`.
///
/// Files are named `<prefix>.enc`, `<prefix>.mat` and `<prefix>.matc`.
pub fn build_files(weights: &[u64], prefix: &Path) -> Result<Vec<PathBuf>, BenchError> {
    let matrix = matrix_from_weights(weights)?;
    let mut written = Vec::with_capacity(SamplerKind::ALL.len());

    for kind in SamplerKind::ALL {
        let path = file_for(prefix, kind);
        let mut out = BufWriter::new(File::create(&path)?);
        match kind {
            SamplerKind::Encoding => write_encoding(&EncodingTree::from_matrix(&matrix), &mut out)?,
            SamplerKind::Matrix => write_matrix(&matrix, &mut out)?,
            SamplerKind::MatrixCached => {
                write_cached(&CachedMatrix::from_matrix(&matrix), &mut out)?
            }
        }
        out.flush()?;
        info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// `<prefix>.<extension of kind>`.
pub fn file_for(prefix: &Path, kind: SamplerKind) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(kind.extension());
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::encoding_from_weights;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("knuth-yao-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir.join("dist")
    }

    #[test]
    fn config_from_toml() {
        let config = BenchConfig::from_toml(
            r#"
            seed = 7
            steps = 10
            sampler = "ky.matc"
            path = "dist.matc"
            word_width = 31
            "#,
        )
        .expect("valid config");
        assert_eq!(config.seed(), 7);
        assert_eq!(config.steps(), 10);
        assert_eq!(config.sampler().expect("known"), SamplerKind::MatrixCached);
        assert_eq!(config.path(), Some(Path::new("dist.matc")));
        assert_eq!(config.word_width(), 31);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn config_defaults_and_unknown_keys() {
        let config = BenchConfig::from_toml("").expect("empty config");
        assert_eq!(config, BenchConfig::default());
        assert!(matches!(
            BenchConfig::from_toml("threads = 4"),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn same_seed_same_report() {
        let sampler: Sampler = encoding_from_weights(&[1, 3, 4, 2]).expect("valid").into();
        let config = BenchConfig::default().with_seed(3).with_steps(10_000);
        let a = run_loaded(&sampler, &config).expect("run");
        let b = run_loaded(&sampler, &config).expect("run");
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.rng_calls, b.rng_calls);
        assert!(a.rng_calls > 0);
    }

    #[test]
    fn rejects_bad_settings() {
        let sampler: Sampler = encoding_from_weights(&[1, 1]).expect("valid").into();
        let config = BenchConfig::default().with_word_width(40);
        assert!(matches!(
            run_loaded(&sampler, &config),
            Err(BenchError::InvalidWordWidth(40))
        ));
        assert!(matches!(
            run(&BenchConfig::default()),
            Err(BenchError::MissingPath)
        ));
        assert!(matches!(
            run(&BenchConfig::default().with_sampler("ky.tree")),
            Err(BenchError::Load(LoadError::UnknownSampler(_)))
        ));
    }

    #[test]
    fn built_files_agree_across_samplers() {
        let prefix = scratch("agree");
        let written = build_files(&[1, 3, 4, 2], &prefix).expect("build");
        assert_eq!(written.len(), 3);

        let reports: Vec<BenchReport> = SamplerKind::ALL
            .into_iter()
            .map(|kind| {
                let config = BenchConfig::default()
                    .with_seed(11)
                    .with_steps(5_000)
                    .with_sampler(kind.key())
                    .with_path(file_for(&prefix, kind));
                run(&config).expect("run")
            })
            .collect();

        for r in &reports[1..] {
            assert_eq!(r.checksum, reports[0].checksum, "{}", r.kind);
            assert_eq!(r.rng_calls, reports[0].rng_calls, "{}", r.kind);
        }
        let line = reports[2].to_string();
        assert!(line.starts_with("ky.matc "), "{line}");
    }

    #[test]
    fn report_line_shows_cpu_seconds() {
        let report = BenchReport {
            kind: SamplerKind::Matrix,
            steps: 10,
            cpu_time: Duration::from_millis(1500),
            wall_time: Duration::from_secs(4),
            rng_calls: 42,
            checksum: 17,
        };
        assert_eq!(report.to_string(), "ky.mat 1.50000 42");
    }
}
