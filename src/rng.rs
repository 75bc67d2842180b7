//! Seeded random streams handed to sketches.
//!
//! A seed is expanded by splitmix64 into four 32-bit words that seed an sfc32
//! generator. The same construction is emitted as JavaScript for the sandboxed
//! frame (see `isolation::sandboxed`), so both must stay bit-exact.

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

pub(crate) const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
pub(crate) const MIX_1: u64 = 0xBF58_476D_1CE4_E5B9;
pub(crate) const MIX_2: u64 = 0x94D0_49BB_1331_11EB;

/// 2^32 as a double, the divisor that maps a raw draw into [0, 1).
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Stage 1: 64-bit mixing generator whose outputs are truncated to 32 bits.
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    #[inline(always)]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(MIX_1);
        z = (z ^ (z >> 27)).wrapping_mul(MIX_2);
        (z ^ (z >> 31)) as u32
    }
}

/// Stage 2: sfc32 stream of uniform doubles.
///
/// Deliberately not `Clone`: a stream can only be restarted by deriving a new
/// one from the seed.
#[derive(Debug)]
pub struct RandomStream {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

/// Build the stream for `seed`. Total over every `u64`, including 0.
pub fn derive(seed: u64) -> RandomStream {
    let mut stage1 = SplitMix64::new(seed);
    let a = stage1.next_u32();
    let b = stage1.next_u32();
    let c = stage1.next_u32();
    let d = stage1.next_u32();
    RandomStream { a, b, c, d }
}

impl RandomStream {
    /// Advance once and return the raw 32-bit draw.
    #[inline(always)]
    pub fn next_raw(&mut self) -> u32 {
        let t = self.a.wrapping_add(self.b).wrapping_add(self.d);
        self.d = self.d.wrapping_add(1);
        self.a = self.b ^ (self.b >> 9);
        self.b = self.c.wrapping_add(self.c << 3);
        self.c = self.c.rotate_left(21).wrapping_add(t);
        t
    }

    /// Next double in [0, 1).
    #[inline(always)]
    pub fn next_f64(&mut self) -> f64 {
        self.next_raw() as f64 / TWO_POW_32
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.next_raw()
    }

    fn next_u64(&mut self) -> u64 {
        let lo = self.next_raw() as u64;
        let hi = self.next_raw() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        rand::rand_core::impls::fill_bytes_via_next(self, dst)
    }
}

/// Picks fresh six-digit seeds for the "randomize" action.
///
/// Entropy comes from `getrandom` (browser crypto API on wasm32).
pub struct SeedPicker {
    inner: SmallRng,
}

impl SeedPicker {
    pub fn new() -> Self {
        Self {
            inner: SmallRng::from_os_rng(),
        }
    }

    /// Deterministic picker for tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: SmallRng::seed_from_u64(seed),
        }
    }

    /// A seed in 100000..=999999, so it always fills the six-digit input.
    pub fn six_digit(&mut self) -> u64 {
        self.inner.random_range(100_000..=999_999)
    }
}

impl Default for SeedPicker {
    fn default() -> Self {
        Self::new()
    }
}
