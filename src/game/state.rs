//! Game State Definitions
//!
//! The single shared aggregate the engine mutates, plus the pure queries the
//! presentation layer reads. Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::hash::{compute_state_hash, StateHash, StateHasher};
use crate::game::dice::{starting_dice, Die, DieFaceNum};
use crate::game::rolloff::player_order;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Stable participant identifier supplied by the hosting transport.
///
/// Ordered lexicographically, which is what the default turn order uses.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// =============================================================================
// PRESENTATION FLAGS
// =============================================================================

/// Screen a player is looking at. Pass-through only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Main board
    #[default]
    WorldMap,
    /// Shop screen
    CashShop,
}

// =============================================================================
// ROLL STATE
// =============================================================================

/// Progress of the current turn's unbanked rolls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "rolls", rename_all = "snake_case")]
pub enum RollState {
    /// No rolls yet this turn.
    #[default]
    NotStarted,
    /// Last roll was a 1. The turn is over until `endTurn`.
    Busted,
    /// Rolled faces so far, never empty and never containing a 1.
    Accumulating(Vec<DieFaceNum>),
}

impl RollState {
    /// Sum of the unbanked faces.
    pub fn total(&self) -> u32 {
        match self {
            RollState::Accumulating(faces) => faces.iter().map(|f| f.get() as u32).sum(),
            RollState::NotStarted | RollState::Busted => 0,
        }
    }

    /// True once a 1 has been rolled this turn.
    pub fn is_busted(&self) -> bool {
        matches!(self, RollState::Busted)
    }

    /// Apply one drawn face.
    pub fn record(&mut self, face: DieFaceNum) {
        if face.is_bust() {
            *self = RollState::Busted;
            return;
        }
        match self {
            RollState::Accumulating(faces) => faces.push(face),
            RollState::NotStarted | RollState::Busted => {
                *self = RollState::Accumulating(vec![face]);
            }
        }
    }

    /// Faces rolled so far (empty when busted or not started).
    pub fn faces(&self) -> &[DieFaceNum] {
        match self {
            RollState::Accumulating(faces) => faces,
            RollState::NotStarted | RollState::Busted => &[],
        }
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        match self {
            RollState::NotStarted => hasher.update_u8(0),
            RollState::Busted => hasher.update_u8(1),
            RollState::Accumulating(faces) => {
                hasher.update_u8(2);
                hasher.update_u32(faces.len() as u32);
                for face in faces {
                    hasher.update_u8(face.get());
                }
            }
        }
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single participant. Created on first join, never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    /// Participant id
    pub id: PlayerId,

    /// Disconnected but still seated
    pub afk: bool,

    /// Banked level, starts at 1
    pub level: u32,

    /// Current turn's unbanked rolls
    pub roll: RollState,

    /// Dice this player owns
    pub dice: Vec<Die>,

    /// Roll-off slots, one per owned die
    pub rolled_nums: Vec<Option<DieFaceNum>>,

    /// Roll-off result once every slot is filled
    pub decided_roll_sum: Option<u32>,

    /// Screen the player is on
    pub view: View,

    /// Whether the dice roll overlay is open
    pub show_dice_roll: bool,

    /// Meso balance
    pub mesos: u32,

    /// Crystal balance (roll-off starting bonus lands here)
    pub crystals: u32,
}

impl PlayerState {
    /// Create a default player owning `dice_count` starting dice.
    pub fn new(id: PlayerId, dice_count: usize) -> Self {
        Self {
            id,
            afk: false,
            level: 1,
            roll: RollState::NotStarted,
            dice: starting_dice(dice_count),
            rolled_nums: vec![None; dice_count],
            decided_roll_sum: None,
            view: View::default(),
            show_dice_roll: false,
            mesos: 0,
            crystals: 0,
        }
    }

    /// True once a 1 has been rolled this turn and the turn is not yet closed.
    pub fn last_roll_was_a_one(&self) -> bool {
        self.roll.is_busted()
    }

    /// Sum of every filled roll-off slot.
    pub fn rolled_sum(&self) -> u32 {
        self.rolled_nums.iter().flatten().map(|f| f.get() as u32).sum()
    }

    /// True once every roll-off slot holds a face.
    pub fn all_slots_rolled(&self) -> bool {
        !self.rolled_nums.is_empty() && self.rolled_nums.iter().all(Option::is_some)
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_str(self.id.as_str());
        hasher.update_bool(self.afk);
        hasher.update_u32(self.level);
        self.roll.hash_into(hasher);
        hasher.update_u32(self.rolled_nums.len() as u32);
        for slot in &self.rolled_nums {
            hasher.update_option(*slot, |h, f| h.update_u8(f.get()));
        }
        hasher.update_option(self.decided_roll_sum, |h, s| h.update_u32(s));
        hasher.update_u8(self.view as u8);
        hasher.update_bool(self.show_dice_roll);
        hasher.update_u32(self.mesos);
        hasher.update_u32(self.crystals);
    }
}

// =============================================================================
// FINAL STANDINGS
// =============================================================================

/// One row of the final report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// Player
    pub player_id: PlayerId,
    /// Level at game end
    pub level: u32,
}

/// Terminal report: every player with their final level, leaderboard order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalStandings {
    /// Rows, winner first
    pub players: Vec<Standing>,
}

impl FinalStandings {
    /// Winner (head of the leaderboard).
    pub fn winner(&self) -> Option<&PlayerId> {
        self.players.first().map(|s| &s.player_id)
    }

    /// Final level for a player.
    pub fn level_of(&self, id: &PlayerId) -> Option<u32> {
        self.players.iter().find(|s| &s.player_id == id).map(|s| s.level)
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete state of one game session.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    /// Level at which the game ends
    pub win_level: u32,

    /// Every participant that ever joined
    pub players: BTreeMap<PlayerId, PlayerState>,

    /// Rotation, always a permutation of `players` keys
    pub turn_order: Vec<PlayerId>,

    /// Player holding the turn, if play has been established
    pub whose_turn: Option<PlayerId>,

    /// Set once, when play becomes active
    pub game_started_at: Option<DateTime<Utc>>,

    /// Roll-off results, one entry per player once known
    pub decided_roll_sum_by_player_id: BTreeMap<PlayerId, u32>,

    /// Roll-off winner, set once when the roll-off resolves
    pub first_player: Option<PlayerId>,

    /// Set on the `endTurn` that crosses the win threshold
    pub game_over: Option<FinalStandings>,
}

impl GameState {
    /// Create a state with one default player per id.
    pub fn new<I>(player_ids: I, win_level: u32, dice_per_player: usize) -> Self
    where
        I: IntoIterator<Item = PlayerId>,
    {
        let players: BTreeMap<PlayerId, PlayerState> = player_ids
            .into_iter()
            .map(|id| (id.clone(), PlayerState::new(id, dice_per_player)))
            .collect();

        let mut state = Self {
            win_level,
            players,
            turn_order: Vec::new(),
            whose_turn: None,
            game_started_at: None,
            decided_roll_sum_by_player_id: BTreeMap::new(),
            first_player: None,
            game_over: None,
        };
        state.recompute_turn_order();
        state
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    /// Rebuild `turn_order` from the current roster.
    ///
    /// Before a roll-off has resolved (and always in the basic variant) this
    /// is the sorted id list. Once a first player exists and roll-off sums are
    /// recorded, ranked players come first by descending sum, then everyone
    /// else by id.
    pub fn recompute_turn_order(&mut self) {
        if self.whose_turn.is_none() || self.decided_roll_sum_by_player_id.is_empty() {
            // BTreeMap keys are already sorted
            self.turn_order = self.players.keys().cloned().collect();
            return;
        }

        let mut order = player_order(self);
        let unranked: Vec<PlayerId> = self.players.keys()
            .filter(|id| !self.decided_roll_sum_by_player_id.contains_key(*id))
            .cloned()
            .collect();
        order.extend(unranked);
        self.turn_order = order;
    }

    /// Id following `current` in the rotation.
    pub fn next_in_turn_order(&self, current: &PlayerId) -> Option<PlayerId> {
        if self.turn_order.is_empty() {
            return None;
        }
        let idx = self.turn_order.iter().position(|id| id == current)?;
        let next = (idx + 1) % self.turn_order.len();
        self.turn_order.get(next).cloned()
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.win_level, |hasher| {
            hasher.update_u32(self.players.len() as u32);
            for player in self.players.values() {
                player.hash_into(hasher);
            }

            hasher.update_u32(self.turn_order.len() as u32);
            for id in &self.turn_order {
                hasher.update_str(id.as_str());
            }

            hasher.update_option(self.whose_turn.as_ref(), |h, id| h.update_str(id.as_str()));
            hasher.update_option(self.game_started_at, |h, t| h.update_i64(t.timestamp_millis()));

            hasher.update_u32(self.decided_roll_sum_by_player_id.len() as u32);
            for (id, sum) in &self.decided_roll_sum_by_player_id {
                hasher.update_str(id.as_str());
                hasher.update_u32(*sum);
            }
            hasher.update_option(self.first_player.as_ref(), |h, id| h.update_str(id.as_str()));

            hasher.update_bool(self.game_over.is_some());
        })
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Number of players not marked AFK.
pub fn total_online(state: &GameState) -> usize {
    state.players.values().filter(|p| !p.afk).count()
}

/// True once any player has reached the win level.
pub fn is_game_over(state: &GameState) -> bool {
    state.players.values().any(|p| p.level >= state.win_level)
}

/// Players by level, descending. Ties keep roster (id) order.
pub fn leaderboard(state: &GameState) -> Vec<&PlayerState> {
    let mut players: Vec<&PlayerState> = state.players.values().collect();
    // sort_by is stable
    players.sort_by(|a, b| b.level.cmp(&a.level));
    players
}

/// Leaderboard as a final report.
pub fn final_standings(state: &GameState) -> FinalStandings {
    FinalStandings {
        players: leaderboard(state)
            .into_iter()
            .map(|p| Standing { player_id: p.id.clone(), level: p.level })
            .collect(),
    }
}

/// Milliseconds since active play began, 0 before that.
pub fn game_time_since_start(state: &GameState, now: DateTime<Utc>) -> i64 {
    state.game_started_at
        .map(|started| (now - started).num_milliseconds())
        .unwrap_or(0)
}

// =============================================================================
// TESTS
// =============================================================================
