//! Two-seed pseudo random generator behind `RAND()`.
//!
//! The sequence is fully determined by the two seeds, so recording the
//! seeds of a session is enough to replay its unseeded `RAND()` calls.

use serde::{Deserialize, Serialize};

const MAX_VALUE: u64 = 0x3FFF_FFFF;

/// The pair of seeds that determines a random sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandSeed {
    pub seed1: u32,
    pub seed2: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandState {
    seed1: u64,
    seed2: u64,
}

impl RandState {
    pub fn new(seed1: u32, seed2: u32) -> Self {
        Self {
            seed1: seed1 as u64 % MAX_VALUE,
            seed2: seed2 as u64 % MAX_VALUE,
        }
    }

    /// State for an explicit `RAND(seed)` argument.
    pub fn from_user_seed(seed: u32) -> Self {
        Self::new(
            seed.wrapping_mul(0x10001).wrapping_add(55_555_555),
            seed.wrapping_mul(0x1000_0001),
        )
    }

    /// State for a new session.
    pub fn from_entropy(session_id: u32) -> Self {
        let base: u32 = rand::random();
        Self::new(base, base.wrapping_add(session_id))
    }

    pub fn restore(seed: RandSeed) -> Self {
        Self {
            seed1: seed.seed1 as u64,
            seed2: seed.seed2 as u64,
        }
    }

    pub fn seed(&self) -> RandSeed {
        RandSeed {
            seed1: self.seed1 as u32,
            seed2: self.seed2 as u32,
        }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.seed1 = (self.seed1 * 3 + self.seed2) % MAX_VALUE;
        self.seed2 = (self.seed1 + self.seed2 + 33) % MAX_VALUE;
        self.seed1 as f64 / MAX_VALUE as f64
    }
}

/// Seeds of the session generator as they were before a statement first
/// used unseeded `RAND()`, encoded for shipping to a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandSeedEvent {
    pub seed: RandSeed,
}

impl RandSeedEvent {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
