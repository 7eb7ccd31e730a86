//! Authoritative Game Engine
//!
//! The sole mutator of `GameState`. Every call validates first and mutates
//! second, so a rejected action leaves the state (and the RNG) untouched.
//!
//! Two start mechanics share one engine:
//! - `Variant::Basic`: the very first roll of the game claims the first turn.
//! - `Variant::RollOff`: every player rolls two personal dice, the highest
//!   sum acts first and calls `StartGame` to begin play.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::rng::{DeterministicRng, FaceRoller};
use crate::game::action::{Action, DieSlot, LifecycleEvent};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::rolloff::{find_first_player, starting_bonuses};
use crate::game::state::{
    final_standings, is_game_over, GameState, PlayerId, PlayerState, RollState, View,
};

/// Placeholder threshold observed in early builds. Kept for scripted games.
pub const OBSERVED_WIN_LEVEL: u32 = 2;

/// Production win threshold.
pub const DEFAULT_WIN_LEVEL: u32 = 50;

/// Dice each player owns in the roll-off variant.
pub const ROLL_OFF_DICE: usize = 2;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// How the first turn is decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// First roll of the game claims the turn
    #[default]
    Basic,
    /// Everyone rolls two dice, highest sum starts
    RollOff,
}

/// Rules for one game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Start mechanic
    pub variant: Variant,
    /// Level at which the game ends
    pub win_level: u32,
    /// Reject `RollDie`/`EndTurn` from anyone but the turn holder
    pub enforce_turn_ownership: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Basic,
            win_level: DEFAULT_WIN_LEVEL,
            enforce_turn_ownership: true,
        }
    }
}

impl GameConfig {
    /// Create config from environment variables.
    ///
    /// - `PIG_DICE_VARIANT`: `basic` or `roll_off`
    /// - `PIG_DICE_WIN_LEVEL`: positive integer
    /// - `PIG_DICE_ENFORCE_TURN`: `true`/`1` or `false`/`0`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            variant: match std::env::var("PIG_DICE_VARIANT").as_deref() {
                Ok("roll_off") | Ok("rolloff") => Variant::RollOff,
                Ok("basic") => Variant::Basic,
                _ => defaults.variant,
            },
            win_level: std::env::var("PIG_DICE_WIN_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(defaults.win_level),
            enforce_turn_ownership: std::env::var("PIG_DICE_ENFORCE_TURN")
                .map(|v| !(v == "false" || v == "0"))
                .unwrap_or(defaults.enforce_turn_ownership),
        }
    }

    /// Dice each player owns under this variant.
    pub fn dice_per_player(&self) -> usize {
        match self.variant {
            Variant::Basic => 1,
            Variant::RollOff => ROLL_OFF_DICE,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Why an action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidActionReason {
    /// Player is not in the roster.
    #[error("unknown player {player_id}")]
    UnknownPlayer {
        /// The unrecognised id.
        player_id: PlayerId,
    },

    /// The game has ended.
    #[error("game is over")]
    GameOver,

    /// Last roll was a 1 and the turn has not been ended.
    #[error("last roll busted; end the turn first")]
    Busted,

    /// Someone else holds the turn.
    #[error("not your turn (turn belongs to {whose_turn})")]
    NotYourTurn {
        /// Current turn holder.
        whose_turn: PlayerId,
    },

    /// No turn holder exists yet.
    #[error("no turn has been established")]
    NoTurnEstablished,

    /// Roll-off rolls must name a die.
    #[error("roll-off roll must name a die slot")]
    SlotRequired,

    /// The named die does not exist.
    #[error("no die in slot {slot}")]
    NoSuchSlot {
        /// Requested slot.
        slot: DieSlot,
    },

    /// The named die was already rolled in this roll-off.
    #[error("die slot {slot} already rolled")]
    SlotAlreadyRolled {
        /// Requested slot.
        slot: DieSlot,
    },

    /// Turn actions before the roll-off has turned into play.
    #[error("game has not started")]
    GameNotStarted,

    /// `StartGame` was already called.
    #[error("game already started")]
    AlreadyStarted,

    /// `StartGame` before the roll-off decided a first player.
    #[error("first player not decided yet")]
    FirstPlayerUndecided,

    /// `StartGame` in a variant without a roll-off.
    #[error("start_game is only available in the roll-off variant")]
    StartGameUnavailable,
}

/// Engine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The action is not valid in the current state. Nothing was changed.
    #[error("invalid action: {0}")]
    InvalidAction(#[from] InvalidActionReason),
}

impl EngineError {
    /// Reason behind the rejection.
    pub fn reason(&self) -> &InvalidActionReason {
        match self {
            EngineError::InvalidAction(reason) => reason,
        }
    }
}

fn invalid<T>(reason: InvalidActionReason) -> Result<T, EngineError> {
    Err(EngineError::InvalidAction(reason))
}

// =============================================================================
// ENGINE
// =============================================================================

/// Owns one `GameState` and the session's face source.
#[derive(Clone, Debug)]
pub struct GameEngine<R: FaceRoller = DeterministicRng> {
    config: GameConfig,
    state: GameState,
    roller: R,
    seq: u64,
}

impl<R: FaceRoller> GameEngine<R> {
    /// Create the game for the players present at session start.
    ///
    /// Roster size bounds are the hosting session's concern.
    pub fn setup<I>(config: GameConfig, player_ids: I, roller: R) -> Self
    where
        I: IntoIterator<Item = PlayerId>,
    {
        let state = GameState::new(player_ids, config.win_level, config.dice_per_player());
        Self { config, state, roller, seq: 0 }
    }

    /// Read-only state snapshot.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Game rules.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Face source (for checkpointing).
    pub fn roller(&self) -> &R {
        &self.roller
    }

    /// Number of accepted actions and events so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Validate and apply one player action.
    ///
    /// `now` stamps `game_started_at` when this action starts the game.
    pub fn apply_action(
        &mut self,
        player_id: &PlayerId,
        action: &Action,
        now: DateTime<Utc>,
    ) -> Result<Vec<GameEvent>, EngineError> {
        if self.state.game_over.is_some() {
            return invalid(InvalidActionReason::GameOver);
        }
        if !self.state.players.contains_key(player_id) {
            return invalid(InvalidActionReason::UnknownPlayer { player_id: player_id.clone() });
        }

        let seq = self.seq + 1;
        let events = match action {
            Action::RollDie { which } => self.roll_die(seq, player_id, *which, now)?,
            Action::EndTurn => self.end_turn(seq, player_id)?,
            Action::StartGame => self.start_game(seq, player_id, now)?,
            Action::SwitchView { view } => self.switch_view(seq, player_id, *view),
            Action::ShowDiceRoll { show } => self.show_dice_roll(seq, player_id, *show),
        };
        self.seq = seq;

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(player = %player_id, action = action.name(), events = events.len(), "action applied");

        Ok(events)
    }

    /// Apply a roster change. Never rejected.
    pub fn apply_event(&mut self, event: &LifecycleEvent) -> Vec<GameEvent> {
        let seq = self.seq + 1;
        let events = match event {
            LifecycleEvent::PlayerJoined { player_id } => self.player_joined(seq, player_id),
            LifecycleEvent::PlayerLeft { player_id } => self.player_left(seq, player_id),
        };
        // Ignored events (unknown leaver) do not count
        if !events.is_empty() {
            self.seq = seq;
        }
        events
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    fn in_roll_off(&self) -> bool {
        self.config.variant == Variant::RollOff && self.state.game_started_at.is_none()
    }

    fn check_turn_owner(&self, player_id: &PlayerId) -> Result<(), EngineError> {
        match &self.state.whose_turn {
            Some(whose_turn) if self.config.enforce_turn_ownership && whose_turn != player_id => {
                invalid(InvalidActionReason::NotYourTurn { whose_turn: whose_turn.clone() })
            }
            _ => Ok(()),
        }
    }

    fn player(&self, player_id: &PlayerId) -> Result<&PlayerState, EngineError> {
        self.state.players.get(player_id).ok_or_else(|| {
            EngineError::InvalidAction(InvalidActionReason::UnknownPlayer { player_id: player_id.clone() })
        })
    }

    fn player_mut(&mut self, player_id: &PlayerId) -> Result<&mut PlayerState, EngineError> {
        self.state.players.get_mut(player_id).ok_or_else(|| {
            EngineError::InvalidAction(InvalidActionReason::UnknownPlayer { player_id: player_id.clone() })
        })
    }

    fn roll_die(
        &mut self,
        seq: u64,
        player_id: &PlayerId,
        which: Option<DieSlot>,
        now: DateTime<Utc>,
    ) -> Result<Vec<GameEvent>, EngineError> {
        if self.in_roll_off() {
            return self.roll_off_die(seq, player_id, which);
        }

        if self.player(player_id)?.last_roll_was_a_one() {
            return invalid(InvalidActionReason::Busted);
        }
        self.check_turn_owner(player_id)?;

        // Validation done; from here on the call is accepted
        let face = self.roller.roll_face();
        let player = self.player_mut(player_id)?;
        let before = player.roll.total();
        player.roll.record(face);

        let mut events = Vec::with_capacity(2);
        let data = if face.is_bust() {
            GameEventData::Busted { discarded: before }
        } else {
            GameEventData::DieRolled { face, unbanked: player.roll.total() }
        };
        events.push(GameEvent::for_player(seq, player_id, data));

        // Basic variant: the first roll of the game claims the first turn
        if self.state.whose_turn.is_none() {
            self.state.whose_turn = Some(player_id.clone());
            self.state.game_started_at = Some(now);
            events.push(GameEvent::for_player(
                seq,
                player_id,
                GameEventData::GameStarted { started_at_ms: now.timestamp_millis() },
            ));
        }

        Ok(events)
    }

    fn roll_off_die(
        &mut self,
        seq: u64,
        player_id: &PlayerId,
        which: Option<DieSlot>,
    ) -> Result<Vec<GameEvent>, EngineError> {
        let slot = match which {
            Some(slot) => slot,
            None => return invalid(InvalidActionReason::SlotRequired),
        };
        match self.player(player_id)?.rolled_nums.get(slot) {
            None => return invalid(InvalidActionReason::NoSuchSlot { slot }),
            Some(Some(_)) => return invalid(InvalidActionReason::SlotAlreadyRolled { slot }),
            Some(None) => {}
        }

        let face = self.roller.roll_face();
        let player = self.player_mut(player_id)?;
        player.rolled_nums[slot] = Some(face);

        let mut events = vec![GameEvent::for_player(
            seq,
            player_id,
            GameEventData::RollOffRolled { slot, face },
        )];

        let newly_decided = player.all_slots_rolled() && player.decided_roll_sum.is_none();
        if newly_decided {
            let sum = player.rolled_sum();
            player.decided_roll_sum = Some(sum);
            self.state.decided_roll_sum_by_player_id.insert(player_id.clone(), sum);
            events.push(GameEvent::for_player(seq, player_id, GameEventData::RollOffRecorded { sum }));

            self.resolve_first_player(seq, &mut events);
            self.state.recompute_turn_order();
        }

        Ok(events)
    }

    /// Set `whose_turn` from the roll-off, at most once.
    fn resolve_first_player(&mut self, seq: u64, events: &mut Vec<GameEvent>) {
        if self.config.variant != Variant::RollOff || self.state.first_player.is_some() {
            return;
        }
        if let Some(first) = find_first_player(&self.state) {
            self.state.first_player = Some(first.clone());
            self.state.whose_turn = Some(first.clone());
            self.state.recompute_turn_order();
            events.push(GameEvent::for_player(seq, &first, GameEventData::FirstPlayerDecided));
        }
    }

    fn end_turn(&mut self, seq: u64, player_id: &PlayerId) -> Result<Vec<GameEvent>, EngineError> {
        if self.in_roll_off() {
            return invalid(InvalidActionReason::GameNotStarted);
        }
        let whose_turn = match &self.state.whose_turn {
            Some(id) => id.clone(),
            None => return invalid(InvalidActionReason::NoTurnEstablished),
        };
        self.check_turn_owner(player_id)?;

        let mut events = Vec::with_capacity(2);

        // Bank, then clear
        let player = self.player_mut(player_id)?;
        let gained = player.roll.total();
        if gained > 0 {
            player.level = player.level.saturating_add(gained);
            let new_level = player.level;
            events.push(GameEvent::for_player(seq, player_id, GameEventData::TurnBanked { gained, new_level }));
        }
        player.roll = RollState::NotStarted;

        if is_game_over(&self.state) {
            let standings = final_standings(&self.state);
            self.state.game_over = Some(standings.clone());
            events.push(GameEvent::new(seq, None, GameEventData::GameOver { standings }));
            return Ok(events);
        }

        if let Some(next) = self.state.next_in_turn_order(&whose_turn) {
            self.state.whose_turn = Some(next.clone());
            events.push(GameEvent::for_player(seq, &next, GameEventData::TurnAdvanced { from: whose_turn }));
        }

        Ok(events)
    }

    fn start_game(
        &mut self,
        seq: u64,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<GameEvent>, EngineError> {
        if self.config.variant != Variant::RollOff {
            return invalid(InvalidActionReason::StartGameUnavailable);
        }
        if self.state.game_started_at.is_some() {
            return invalid(InvalidActionReason::AlreadyStarted);
        }
        match &self.state.whose_turn {
            None => return invalid(InvalidActionReason::FirstPlayerUndecided),
            Some(whose_turn) if whose_turn != player_id => {
                return invalid(InvalidActionReason::NotYourTurn { whose_turn: whose_turn.clone() });
            }
            Some(_) => {}
        }

        self.state.game_started_at = Some(now);
        let mut events = vec![GameEvent::for_player(
            seq,
            player_id,
            GameEventData::GameStarted { started_at_ms: now.timestamp_millis() },
        )];

        // Rank 0 (highest roll-off sum) gets the most
        for (rank, (id, crystals)) in starting_bonuses(&self.state).into_iter().enumerate() {
            if let Some(player) = self.state.players.get_mut(&id) {
                player.crystals = player.crystals.saturating_add(crystals);
            }
            events.push(GameEvent::for_player(seq, &id, GameEventData::StartingBonus { rank, crystals }));
        }

        Ok(events)
    }

    fn switch_view(&mut self, seq: u64, player_id: &PlayerId, view: View) -> Vec<GameEvent> {
        if let Some(player) = self.state.players.get_mut(player_id) {
            player.view = view;
        }
        vec![GameEvent::for_player(seq, player_id, GameEventData::ViewSwitched { view })]
    }

    fn show_dice_roll(&mut self, seq: u64, player_id: &PlayerId, show: bool) -> Vec<GameEvent> {
        if let Some(player) = self.state.players.get_mut(player_id) {
            player.show_dice_roll = show;
        }
        vec![GameEvent::for_player(seq, player_id, GameEventData::DiceRollShown { show })]
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn player_joined(&mut self, seq: u64, player_id: &PlayerId) -> Vec<GameEvent> {
        let data = match self.state.players.get_mut(player_id) {
            Some(player) => {
                player.afk = false;
                GameEventData::PlayerReconnected
            }
            None => {
                let player = PlayerState::new(player_id.clone(), self.config.dice_per_player());
                self.state.players.insert(player_id.clone(), player);
                GameEventData::PlayerJoined
            }
        };
        self.state.recompute_turn_order();
        vec![GameEvent::for_player(seq, player_id, data)]
    }

    fn player_left(&mut self, seq: u64, player_id: &PlayerId) -> Vec<GameEvent> {
        let Some(player) = self.state.players.get_mut(player_id) else {
            return Vec::new();
        };
        player.afk = true;
        self.state.recompute_turn_order();

        let mut events = vec![GameEvent::for_player(seq, player_id, GameEventData::PlayerLeft)];
        // The departing player may have been the last one blocking the roll-off
        if self.in_roll_off() {
            self.resolve_first_player(seq, &mut events);
        }
        events
    }
}

// =============================================================================
// TESTS
// =============================================================================
