//! Core deterministic primitives.
//!
//! Seeded randomness and state hashing. Everything the engine needs to make a
//! game replayable from its action log.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, FaceRoller};
pub use hash::{compute_state_hash, StateHash, StateHasher};
