//! Random stream registry
//!
//! The registry hands out substream identities; a `(seed, run, stream)`
//! triple always yields the same sequence. User-assigned streams use the
//! lower half of the index space, automatic streams the upper half.

use std::cell::Cell;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// First index handed out to automatically assigned streams
pub const AUTOMATIC_STREAM_BASE: u64 = 1 << 63;

thread_local! {
    static SEED: Cell<u32> = const { Cell::new(1) };
    static RUN: Cell<u64> = const { Cell::new(1) };
    static NEXT_AUTOMATIC: Cell<u64> = const { Cell::new(AUTOMATIC_STREAM_BASE) };
}

/// Set the global seed (must be non-zero; zero is mapped to one)
pub fn set_seed(seed: u32) {
    SEED.with(|s| s.set(seed.max(1)));
}

pub fn get_seed() -> u32 {
    SEED.with(|s| s.get())
}

/// Set the run number (the substream selector across replications)
pub fn set_run(run: u64) {
    RUN.with(|r| r.set(run));
}

pub fn get_run() -> u64 {
    RUN.with(|r| r.get())
}

/// Allocate one automatic stream index
pub fn next_automatic_stream() -> u64 {
    NEXT_AUTOMATIC.with(|n| {
        let index = n.get();
        n.set(index + 1);
        index
    })
}

/// Restore seed, run and automatic stream counter to their defaults
pub fn reset_streams() {
    SEED.with(|s| s.set(1));
    RUN.with(|r| r.set(1));
    NEXT_AUTOMATIC.with(|n| n.set(AUTOMATIC_STREAM_BASE));
}

/// A stochastic component that needs one or more independent streams
pub trait StreamConsumer {
    /// Number of streams this component consumes
    fn streams_required(&self) -> u64 {
        1
    }

    /// Bind this component to indices starting at `next`.
    /// Returns the number of indices consumed.
    fn assign_streams(&self, next: u64) -> u64;
}

/// Assign contiguous streams to a set of consumers, in order.
/// Returns the total number of indices consumed.
pub fn assign_streams<'a, I>(consumers: I, next: u64) -> u64
where
    I: IntoIterator<Item = &'a dyn StreamConsumer>,
{
    let mut current = next;
    for consumer in consumers {
        current += consumer.assign_streams(current);
    }
    current - next
}

/// Mix three words into one seed (splitmix64 finaliser)
fn mix(seed: u32, run: u64, stream: u64) -> u64 {
    let mut z = (seed as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(run.rotate_left(21))
        ^ stream.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A reproducible random number stream
pub struct RngStream {
    rng: StdRng,
    stream: u64,
}

impl RngStream {
    /// Stream for the current global seed and run
    pub fn new(stream: u64) -> Self {
        Self::with_seed(get_seed(), get_run(), stream)
    }

    pub fn with_seed(seed: u32, run: u64, stream: u64) -> Self {
        RngStream {
            rng: StdRng::seed_from_u64(mix(seed, run, stream)),
            stream,
        }
    }

    #[inline]
    pub fn stream(&self) -> u64 {
        self.stream
    }

    /// Uniform in the open interval (0, 1)
    pub fn rand_u01(&mut self) -> f64 {
        loop {
            let u: f64 = self.rng.gen();
            if u > 0.0 {
                return u;
            }
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

impl std::fmt::Debug for RngStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RngStream({})", self.stream)
    }
}
