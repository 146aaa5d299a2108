//! Fair random bits.
//!
//! Samplers consume randomness one bit at a time. Drawing a fresh word from the
//! generator per bit would waste almost all of it, so [`BitSource`] buffers one word and
//! shifts bits out of it lazily, most significant first (Lumbroso 2013, "Optimal
//! Discrete Uniform Generation from Coin Flips, and Applications").
//!
//! The number of words drawn is exposed through [`BitSource::rng_calls`]: it is the
//! amount of "true" randomness a run consumed.
//!
//! Notes:
//! - [`ReplayBits`] replays a fixed bit sequence. It exists for exhaustive tests and for
//!   replaying one bit stream against several representations.

use rand::RngCore;

/// Something that yields independent fair bits.
pub trait RandomBits {
    /// Next bit, `0` or `1`.
    fn next_bit(&mut self) -> u8;

    /// Build an unsigned integer from `width` bits, most significant bit first.
    ///
    /// # Panics
    ///
    /// Panics if `width > 64`.
    #[inline]
    fn next_int(&mut self, width: u32) -> u64 {
        assert!(width <= 64, "next_int: width must be <= 64 (got {width})");
        let mut acc = 0u64;
        for _ in 0..width {
            acc = (acc << 1) | u64::from(self.next_bit());
        }
        acc
    }
}

impl<B: RandomBits + ?Sized> RandomBits for &mut B {
    #[inline]
    fn next_bit(&mut self) -> u8 {
        (**self).next_bit()
    }
}

/// Lazily buffered bits from a uniform word generator.
#[derive(Debug, Clone)]
pub struct BitSource<R> {
    rng: R,
    word_width: u32,
    word: u32,
    remaining: u32,
    rng_calls: u64,
}

impl<R: RngCore> BitSource<R> {
    /// Usable bits per word when none is given.
    pub const DEFAULT_WORD_WIDTH: u32 = 32;

    /// Wrap `rng`, using all 32 bits of each word.
    pub fn new(rng: R) -> Self {
        Self::with_word_width(rng, Self::DEFAULT_WORD_WIDTH)
    }

    /// Wrap `rng`, using only the top `word_width` bits of each `u32` word.
    ///
    /// A width of 31 matches the word size of a C `rand()` with `RAND_MAX = 2^31 - 1`.
    ///
    /// # Panics
    ///
    /// Panics if `word_width` is 0 or greater than 32.
    pub fn with_word_width(rng: R, word_width: u32) -> Self {
        assert!(
            (1..=32).contains(&word_width),
            "BitSource: word width must be in 1..=32 (got {word_width})"
        );
        Self {
            rng,
            word_width,
            word: 0,
            remaining: 0,
            rng_calls: 0,
        }
    }

    /// Number of words drawn from the generator so far.
    pub fn rng_calls(&self) -> u64 {
        self.rng_calls
    }

    /// Usable bits per word.
    pub fn word_width(&self) -> u32 {
        self.word_width
    }

    /// Bits of the current word not yet handed out.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Recover the generator.
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: RngCore> RandomBits for BitSource<R> {
    #[inline]
    fn next_bit(&mut self) -> u8 {
        if self.remaining == 0 {
            self.word = self.rng.next_u32() >> (32 - self.word_width);
            self.rng_calls += 1;
            self.remaining = self.word_width;
        }
        self.remaining -= 1;
        ((self.word >> self.remaining) & 1) as u8
    }
}

/// A fixed bit sequence, replayed in order.
#[derive(Debug, Clone)]
pub struct ReplayBits<'a> {
    bits: &'a [u8],
    pos: usize,
}

impl<'a> ReplayBits<'a> {
    /// Replay `bits`; any non-zero entry counts as a `1`.
    pub fn new(bits: &'a [u8]) -> Self {
        Self { bits, pos: 0 }
    }

    /// Bits handed out so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Bits left to replay.
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.pos
    }
}

impl RandomBits for ReplayBits<'_> {
    /// # Panics
    ///
    /// Panics once the sequence is exhausted.
    #[inline]
    fn next_bit(&mut self) -> u8 {
        let bit = self.bits.get(self.pos).copied().unwrap_or_else(|| {
            panic!(
                "ReplayBits: sequence exhausted after {} bits",
                self.bits.len()
            )
        });
        self.pos += 1;
        u8::from(bit != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Hands out a fixed list of words, then zeros.
    struct Words {
        words: Vec<u32>,
        next: usize,
    }

    impl Words {
        fn new(words: &[u32]) -> Self {
            Self {
                words: words.to_vec(),
                next: 0,
            }
        }
    }

    impl RngCore for Words {
        fn next_u32(&mut self) -> u32 {
            let w = self.words.get(self.next).copied().unwrap_or(0);
            self.next += 1;
            w
        }

        fn next_u64(&mut self) -> u64 {
            u64::from(self.next_u32())
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for b in dst {
                *b = self.next_u32() as u8;
            }
        }
    }

    #[test]
    fn bits_come_out_msb_first() {
        let mut bits = BitSource::new(Words::new(&[0b1011 << 28]));
        let got: Vec<u8> = (0..6).map(|_| bits.next_bit()).collect();
        assert_eq!(got, vec![1, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn next_int_accumulates_msb_first() {
        let mut bits = BitSource::new(Words::new(&[0b101 << 29]));
        assert_eq!(bits.next_int(3), 5);
        assert_eq!(bits.rng_calls(), 1);

        let mut replay = ReplayBits::new(&[1, 0, 1]);
        assert_eq!(replay.next_int(3), 5);
        assert_eq!(replay.consumed(), 3);
    }

    #[test]
    fn next_int_zero_width_draws_nothing() {
        let mut bits = BitSource::new(ChaCha8Rng::seed_from_u64(1));
        assert_eq!(bits.next_int(0), 0);
        assert_eq!(bits.rng_calls(), 0);
    }

    #[test]
    fn counter_advances_once_per_word() {
        for width in [1u32, 7, 31, 32] {
            let mut bits = BitSource::with_word_width(ChaCha8Rng::seed_from_u64(9), width);
            assert_eq!(bits.rng_calls(), 0);

            bits.next_bit();
            assert_eq!(bits.rng_calls(), 1);
            for _ in 1..width {
                bits.next_bit();
            }
            assert_eq!(bits.rng_calls(), 1, "width={width}");
            assert_eq!(bits.remaining(), 0);

            bits.next_bit();
            assert_eq!(bits.rng_calls(), 2, "width={width}");
            assert_eq!(bits.remaining(), width - 1);
        }
    }

    #[test]
    fn narrow_words_use_top_bits() {
        // Top 4 bits are 1001; everything below them must be ignored.
        let mut bits = BitSource::with_word_width(Words::new(&[0x9FFF_FFFF, 0]), 4);
        let got: Vec<u8> = (0..8).map(|_| bits.next_bit()).collect();
        assert_eq!(got, vec![1, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(bits.rng_calls(), 2);
    }

    #[test]
    fn same_seed_same_bits() {
        let mut a = BitSource::new(ChaCha8Rng::seed_from_u64(42));
        let mut b = BitSource::new(ChaCha8Rng::seed_from_u64(42));
        for _ in 0..1_000 {
            assert_eq!(a.next_bit(), b.next_bit());
        }
        assert_eq!(a.rng_calls(), b.rng_calls());
    }

    #[test]
    fn bits_are_roughly_fair() {
        let mut bits = BitSource::new(ChaCha8Rng::seed_from_u64(7));
        let n = 100_000;
        let ones: u32 = (0..n).map(|_| u32::from(bits.next_bit())).sum();
        let frac = f64::from(ones) / f64::from(n);
        assert!((frac - 0.5).abs() < 0.01, "fraction of ones was {frac}");
    }

    #[test]
    #[should_panic(expected = "word width")]
    fn zero_word_width_rejected() {
        let _ = BitSource::with_word_width(ChaCha8Rng::seed_from_u64(0), 0);
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn replay_panics_when_exhausted() {
        let mut replay = ReplayBits::new(&[1]);
        replay.next_bit();
        replay.next_bit();
    }
}
