//! Game Events
//!
//! Events produced by accepted actions and lifecycle events, for
//! subscribers and the action log.

use serde::{Serialize, Deserialize};

use crate::game::dice::DieFaceNum;
use crate::game::state::{FinalStandings, PlayerId, View};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEventData {
    /// A face was drawn for a push-your-luck roll
    DieRolled {
        /// Face drawn.
        face: DieFaceNum,
        /// Unbanked total after the roll.
        unbanked: u32,
    },

    /// A 1 was drawn; the turn's accumulation is gone
    Busted {
        /// Total lost.
        discarded: u32,
    },

    /// A roll-off die was rolled
    RollOffRolled {
        /// Die slot.
        slot: usize,
        /// Face drawn.
        face: DieFaceNum,
    },

    /// Every roll-off slot of a player is filled
    RollOffRecorded {
        /// Sum of both roll-off dice.
        sum: u32,
    },

    /// The roll-off resolved into a first player
    FirstPlayerDecided,

    /// Active play began
    GameStarted {
        /// Start time, ms since epoch.
        started_at_ms: i64,
    },

    /// Starting crystals from roll-off rank
    StartingBonus {
        /// Roll-off rank, 0 is first.
        rank: usize,
        /// Crystals granted.
        crystals: u32,
    },

    /// Unbanked rolls were added to the level
    TurnBanked {
        /// Amount banked.
        gained: u32,
        /// Level after banking.
        new_level: u32,
    },

    /// The turn moved on
    TurnAdvanced {
        /// Previous turn holder.
        from: PlayerId,
    },

    /// A player reached the win level
    GameOver {
        /// Final results.
        standings: FinalStandings,
    },

    /// Presentation: screen changed
    ViewSwitched {
        /// New screen.
        view: View,
    },

    /// Presentation: dice overlay toggled
    DiceRollShown {
        /// Overlay open.
        show: bool,
    },

    /// New participant
    PlayerJoined,

    /// Known participant came back
    PlayerReconnected,

    /// Participant disconnected
    PlayerLeft,
}

/// A game event with ordering and the player it concerns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Engine step that produced the event
    pub seq: u64,

    /// Player involved
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(seq: u64, player_id: Option<PlayerId>, data: GameEventData) -> Self {
        Self { seq, player_id, data }
    }

    /// Create an event about one player.
    pub fn for_player(seq: u64, player_id: &PlayerId, data: GameEventData) -> Self {
        Self::new(seq, Some(player_id.clone()), data)
    }

    /// True for the terminal event.
    pub fn is_game_over(&self) -> bool {
        matches!(self.data, GameEventData::GameOver { .. })
    }
}
