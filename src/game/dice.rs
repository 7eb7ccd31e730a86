//! Dice Content
//!
//! Static die definitions. Faces are never mutated at runtime; the only
//! runtime state is which face number was rolled.

use serde::{Serialize, Deserialize};

// =============================================================================
// FACE NUMBER
// =============================================================================

/// A rolled face number, always in `1..=6`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DieFaceNum(u8);

impl DieFaceNum {
    /// The bust face.
    pub const BUST: DieFaceNum = DieFaceNum(1);

    /// Create from a raw number. `None` outside `1..=6`.
    pub const fn new(n: u8) -> Option<Self> {
        if n >= 1 && n <= 6 {
            Some(Self(n))
        } else {
            None
        }
    }

    /// Raw face number.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Rolling a 1 discards the turn's unbanked accumulation.
    #[inline]
    pub const fn is_bust(self) -> bool {
        self.0 == 1
    }

    /// Zero-based index into a die's faces.
    #[inline]
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<u8> for DieFaceNum {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("die face {} out of range 1..=6", value))
    }
}

impl From<DieFaceNum> for u8 {
    fn from(face: DieFaceNum) -> u8 {
        face.0
    }
}

// =============================================================================
// FACE CONTENT
// =============================================================================

/// What a face grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainType {
    /// Currency.
    Meso,
    /// Attack stat.
    Power,
    /// Magic stat.
    Wisdom,
    /// Character level.
    Level,
}

/// One (gain type, amount) pair.
pub type Gain = (GainType, u32);

/// Content printed on one face of a die.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DieFace {
    /// One gain, unconditionally applied.
    Single {
        /// The gain.
        gain: Gain,
    },
    /// Pick one of the gains.
    Or {
        /// Alternatives.
        gains: Vec<Gain>,
    },
    /// All gains applied.
    And {
        /// Gains applied together.
        gains: Vec<Gain>,
    },
}

impl DieFace {
    /// Every gain listed on the face, regardless of the pick semantics.
    pub fn gains(&self) -> &[Gain] {
        match self {
            DieFace::Single { gain } => std::slice::from_ref(gain),
            DieFace::Or { gains } | DieFace::And { gains } => gains,
        }
    }

    /// True when the holder must choose one of the gains.
    pub fn is_choice(&self) -> bool {
        matches!(self, DieFace::Or { .. })
    }
}

/// A six-sided die, faces ordered by face number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Die {
    /// Face content, index 0 is face 1.
    pub faces: [DieFace; 6],
}

impl Die {
    /// Face content for a rolled number.
    pub fn face(&self, num: DieFaceNum) -> &DieFace {
        &self.faces[num.index()]
    }
}

/// The die every player starts with.
///
/// Placeholder content. Faces carry no rules weight yet; only the face
/// number drives play.
pub fn starting_die() -> Die {
    Die {
        faces: [
            DieFace::Single { gain: (GainType::Meso, 1) },
            DieFace::Single { gain: (GainType::Power, 1) },
            DieFace::Single { gain: (GainType::Wisdom, 1) },
            DieFace::Or { gains: vec![(GainType::Power, 2), (GainType::Wisdom, 2)] },
            DieFace::And { gains: vec![(GainType::Meso, 2), (GainType::Power, 1)] },
            DieFace::Single { gain: (GainType::Level, 1) },
        ],
    }
}

/// Starting dice for a player owning `count` dice.
pub fn starting_dice(count: usize) -> Vec<Die> {
    (0..count).map(|_| starting_die()).collect()
}
