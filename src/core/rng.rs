//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//!
//! Die draws are server-side only. A session seeds one generator at setup and
//! every accepted roll advances it, so a recorded action log replays to the
//! exact same faces.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::game::dice::DieFaceNum;

/// Source of die face numbers for the engine.
///
/// The draw is a flat 1-in-6 selection over face numbers, independent of
/// what content is printed on the rolled face.
pub trait FaceRoller {
    /// Draw one face number in `1..=6`.
    fn roll_face(&mut self) -> DieFaceNum;
}

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG will produce the exact same sequence
/// of random numbers on any platform (x86, ARM, WASM).
///
/// # Example
///
/// ```
/// use pig_dice::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    ///
    /// Plain modulo reduction. The bias is negligible for the small ranges
    /// used by the engine.
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

impl FaceRoller for DeterministicRng {
    #[inline]
    fn roll_face(&mut self) -> DieFaceNum {
        // next_int(6) is always < 6, so the face is always valid
        DieFaceNum::new(self.next_int(6) as u8 + 1).unwrap_or(DieFaceNum::BUST)
    }
}

/// Roller that replays a fixed list of faces, then falls back to a seeded
/// generator.
///
/// Used to drive scripted games (tests, tutorials) through the same engine.
#[derive(Clone, Debug)]
pub struct ScriptedRoller {
    script: VecDeque<DieFaceNum>,
    fallback: DeterministicRng,
}

impl ScriptedRoller {
    /// Script from raw face numbers. Out-of-range numbers are skipped.
    pub fn new(faces: &[u8]) -> Self {
        Self {
            script: faces.iter().filter_map(|n| DieFaceNum::new(*n)).collect(),
            fallback: DeterministicRng::new(0),
        }
    }

    /// Faces left in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FaceRoller for ScriptedRoller {
    fn roll_face(&mut self) -> DieFaceNum {
        match self.script.pop_front() {
            Some(face) => face,
            None => self.fallback.roll_face(),
        }
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a session seed from the session id and its starting roster.
///
/// - `session_id`: unique per session (uuid bytes)
/// - `player_ids`: roster at setup, sorted here so the caller's order
///   cannot influence the seed
pub fn derive_session_seed(session_id: &[u8; 16], player_ids: &[&str]) -> u64 {
    let mut sorted: Vec<&str> = player_ids.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"PIG_DICE_SEED_V1");
    hasher.update(session_id);

    for pid in sorted {
        // Length prefix keeps ["ab", "c"] and ["a", "bc"] apart
        hasher.update((pid.len() as u32).to_le_bytes());
        hasher.update(pid.as_bytes());
    }

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
