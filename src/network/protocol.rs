//! Protocol Messages
//!
//! Message types for the action/event protocol between a hosting transport
//! and a game session. Framing belongs to the transport; these types only
//! fix the JSON shape.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::game::action::Action;
use crate::game::engine::InvalidActionReason;
use crate::game::events::GameEvent;
use crate::game::rolloff::{elected, Elected};
use crate::game::state::{
    game_time_since_start, leaderboard, total_online, FinalStandings, GameState,
    PlayerId, PlayerState, View,
};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Take a seat (or reclaim one after a disconnect).
    Join {
        /// Caller id, as established by the transport
        player_id: PlayerId,
    },

    /// Submit a game action.
    Action {
        /// The action
        action: Action,
    },

    /// Request a full snapshot (for reconnection).
    SyncRequest,

    /// Ping for latency measurement.
    Ping {
        /// Client clock, echoed back.
        timestamp: u64,
    },

    /// Player is leaving the game.
    Leave,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Seat confirmed.
    Welcome(WelcomeInfo),

    /// Full state snapshot.
    State(StateSnapshot),

    /// Events produced by one accepted action or lifecycle event.
    Events {
        /// In sequence order.
        events: Vec<GameEvent>,
    },

    /// The caller's action was rejected. Nothing changed.
    Rejected {
        /// Offending action
        action: Action,
        /// Machine-readable reason
        reason: InvalidActionReason,
    },

    /// Terminal report.
    GameOver(GameOverInfo),

    /// Pong response.
    Pong {
        /// Echo of the ping timestamp.
        timestamp: u64,
        /// Server clock in ms.
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),
}

/// Sent after a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeInfo {
    /// Session identifier (uuid, hyphenated).
    pub session_id: String,
    /// Seated player.
    pub player_id: PlayerId,
    /// Smoothing hint for clients, milliseconds.
    pub input_delay_ms: u64,
    /// Server version.
    pub server_version: String,
}

/// What every client sees of one player.
///
/// Roll-off faces are left out; sums are published through `elected` once
/// the first player is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Disconnected but seated.
    pub afk: bool,
    /// Banked level.
    pub level: u32,
    /// Unbanked faces this turn.
    pub unbanked: Vec<u8>,
    /// Last roll was a 1.
    pub busted: bool,
    /// Roll-off dice already rolled.
    pub rolled_slots: usize,
    /// Roll-off finished for this player.
    pub roll_off_done: bool,
    /// Current screen.
    pub view: View,
    /// Dice overlay open.
    pub show_dice_roll: bool,
    /// Meso balance.
    pub mesos: u32,
    /// Crystal balance.
    pub crystals: u32,
}

impl PlayerSnapshot {
    /// Build from engine state.
    pub fn from_player(player: &PlayerState) -> Self {
        Self {
            player_id: player.id.clone(),
            afk: player.afk,
            level: player.level,
            unbanked: player.roll.faces().iter().map(|f| f.get()).collect(),
            busted: player.roll.is_busted(),
            rolled_slots: player.rolled_nums.iter().flatten().count(),
            roll_off_done: player.decided_roll_sum.is_some(),
            view: player.view,
            show_dice_roll: player.show_dice_roll,
            mesos: player.mesos,
            crystals: player.crystals,
        }
    }
}

/// Full game snapshot for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Accepted actions and events so far.
    pub seq: u64,
    /// Players in roster order.
    pub players: Vec<PlayerSnapshot>,
    /// Rotation.
    pub turn_order: Vec<PlayerId>,
    /// Turn holder.
    pub whose_turn: Option<PlayerId>,
    /// When play began.
    pub game_started_at: Option<DateTime<Utc>>,
    /// Milliseconds of active play.
    pub game_time_ms: i64,
    /// Players not AFK.
    pub total_online: usize,
    /// Ids by level, descending.
    pub leaderboard: Vec<PlayerId>,
    /// Roll-off results, once public.
    pub elected: Elected,
    /// Level that ends the game.
    pub win_level: u32,
    /// Game has ended.
    pub game_over: bool,
    /// Hex state hash.
    pub state_hash: String,
}

impl StateSnapshot {
    /// Build from engine state at `now`.
    pub fn from_state(state: &GameState, seq: u64, now: DateTime<Utc>) -> Self {
        Self {
            seq,
            players: state.players.values().map(PlayerSnapshot::from_player).collect(),
            turn_order: state.turn_order.clone(),
            whose_turn: state.whose_turn.clone(),
            game_started_at: state.game_started_at,
            game_time_ms: game_time_since_start(state, now),
            total_online: total_online(state),
            leaderboard: leaderboard(state).into_iter().map(|p| p.id.clone()).collect(),
            elected: elected(state),
            win_level: state.win_level,
            game_over: state.game_over.is_some(),
            state_hash: hex::encode(state.compute_hash()),
        }
    }

    /// Look up one player.
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| &p.player_id == id)
    }
}

/// Game over report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverInfo {
    /// Session identifier.
    pub session_id: String,
    /// Final levels in leaderboard order.
    pub standings: FinalStandings,
    /// Hex hash of the final state.
    pub final_state_hash: String,
}

/// Error from server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidMessage,
    /// Session does not exist.
    SessionNotFound,
    /// Session is full.
    SessionFull,
    /// Caller has not joined.
    NotInSession,
    /// Version mismatch.
    VersionMismatch,
    /// Internal server error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::dice::DieFaceNum;
    use crate::game::events::GameEventData;

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| PlayerId::from(*n)).collect()
    }

    #[test]
    fn test_client_action_json_shape() {
        let msg = ClientMessage::Action { action: Action::roll_slot(0) };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"type":"action","action":{"action":"roll_die","which":0}}"#);
        assert_eq!(ClientMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_client_join_and_ping() {
        let parsed = ClientMessage::from_json(r#"{"type":"join","player_id":"mia"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Join { player_id: "mia".into() });

        let parsed = ClientMessage::from_json(r#"{"type":"ping","timestamp":12}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Ping { timestamp: 12 });
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn test_rejected_carries_reason() {
        let msg = ServerMessage::Rejected {
            action: Action::roll(),
            reason: InvalidActionReason::NotYourTurn { whose_turn: "bo".into() },
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""reason":"not_your_turn""#));
        assert!(json.contains(r#""whose_turn":"bo""#));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_snapshot_from_state() {
        let mut state = GameState::new(ids(&["a", "b"]), 10, 2);
        {
            let b = state.players.get_mut(&"b".into()).unwrap();
            b.level = 6;
            b.roll.record(DieFaceNum::new(4).unwrap());
            b.rolled_nums[0] = DieFaceNum::new(3);
        }
        state.players.get_mut(&"a".into()).unwrap().afk = true;

        let now = Utc::now();
        let snapshot = StateSnapshot::from_state(&state, 5, now);
        assert_eq!(snapshot.seq, 5);
        assert_eq!(snapshot.total_online, 1);
        assert_eq!(snapshot.leaderboard, ids(&["b", "a"]));
        assert_eq!(snapshot.game_time_ms, 0);
        assert_eq!(snapshot.elected, Elected::default());
        assert_eq!(snapshot.state_hash, hex::encode(state.compute_hash()));

        let b = snapshot.player(&"b".into()).unwrap();
        assert_eq!(b.unbanked, vec![4]);
        assert_eq!(b.rolled_slots, 1);
        assert!(!b.roll_off_done);
    }

    #[test]
    fn test_events_message() {
        let msg = ServerMessage::Events {
            events: vec![GameEvent::for_player(1, &"a".into(), GameEventData::FirstPlayerDecided)],
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"events""#));
        assert!(json.contains(r#""event":"first_player_decided""#));
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::Error(ServerError {
            code: ErrorCode::SessionFull,
            message: "table is full".to_string(),
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains("session_full"));
    }
}
