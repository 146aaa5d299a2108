//! Build a distribution from integer weights and sample it with each representation.
//!
//! ```bash
//! cargo run --example sampling
//! ```

use std::error::Error;

use knuth_yao::bench::build_files;
use knuth_yao::{matrix_from_weights, BitSource, CachedMatrix, EncodingTree, Sampler};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

fn main() -> Result<(), Box<dyn Error>> {
    let weights = [1u64, 3, 4, 2];
    let total: u64 = weights.iter().sum();
    let draws = 100_000;

    let matrix = matrix_from_weights(&weights)?;
    println!(
        "weights {weights:?}: k={} l={} hamming={:?}",
        matrix.k(),
        matrix.l(),
        matrix.hamming_vector()
    );

    let samplers: [Sampler; 3] = [
        EncodingTree::from_matrix(&matrix).into(),
        CachedMatrix::from_matrix(&matrix).into(),
        matrix.into(),
    ];

    for sampler in &samplers {
        let mut bits = BitSource::new(Xoshiro256StarStar::seed_from_u64(7));
        let mut counts = vec![0u64; weights.len()];
        for _ in 0..draws {
            counts[sampler.sample(&mut bits) - 1] += 1;
        }

        println!("\n{} ({} generator words)", sampler.kind(), bits.rng_calls());
        for (i, (&w, &c)) in weights.iter().zip(&counts).enumerate() {
            println!(
                "  {}: observed {:.4}, exact {:.4}",
                i + 1,
                c as f64 / draws as f64,
                w as f64 / total as f64
            );
        }
    }

    let prefix = std::env::temp_dir().join("knuth-yao-demo");
    println!();
    for path in build_files(&weights, &prefix)? {
        println!("wrote {}", path.display());
    }
    println!(
        "time it with: kybench run {} --sampler ky.matc",
        prefix.with_extension("matc").display()
    );
    Ok(())
}
