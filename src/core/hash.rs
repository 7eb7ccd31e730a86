//! State Hashing for Verification
//!
//! Provides deterministic hashing of game state for:
//! - Replay validation (a replayed action log must land on the same hash)
//! - Cheap divergence checks between the session and its subscribers

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256 with helpers for the engine's primitive types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for game state.
    pub fn for_game_state() -> Self {
        Self::new(b"PIG_DICE_STATE_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a length-prefixed string.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Update with an optional value: a presence byte, then the value.
    #[inline]
    pub fn update_option<T, F>(&mut self, value: Option<T>, add: F)
    where
        F: FnOnce(&mut Self, T),
    {
        match value {
            Some(v) => {
                self.update_u8(1);
                add(self, v);
            }
            None => self.update_u8(0),
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute state hash for replay verification.
///
/// This function is called by `GameState::compute_hash()`.
/// The closure adds state-specific data after the common header.
pub fn compute_state_hash<F>(win_level: u32, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_game_state();

    // Rules first: the same board under a different threshold is a
    // different game
    hasher.update_u32(win_level);

    add_state(&mut hasher);

    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        let h1 = compute_state_hash(10, |h| {
            h.update_str("alice");
            h.update_u32(7);
        });
        let h2 = compute_state_hash(10, |h| {
            h.update_str("alice");
            h.update_u32(7);
        });
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_sensitive_to_win_level() {
        let h1 = compute_state_hash(10, |_| {});
        let h2 = compute_state_hash(11, |_| {});
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_string_prefix_disambiguates() {
        let mut a = StateHasher::for_game_state();
        a.update_str("ab");
        a.update_str("c");

        let mut b = StateHasher::for_game_state();
        b.update_str("a");
        b.update_str("bc");

        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_option_presence_byte() {
        let mut some_zero = StateHasher::for_game_state();
        some_zero.update_option(Some(0u32), |h, v| h.update_u32(v));

        let mut none = StateHasher::for_game_state();
        none.update_option(None::<u32>, |h, v| h.update_u32(v));

        assert_ne!(some_zero.finalize(), none.finalize());
    }
}
