//! Action Log and Deterministic Replay
//!
//! Records everything submitted to one game, accepted or not. Given the same
//! config, roster and seed, replaying the log through a fresh engine must
//! reproduce every accept/reject decision and the final state hash.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::hash::StateHash;
use crate::core::rng::DeterministicRng;
use crate::game::action::{Action, LifecycleEvent};
use crate::game::engine::{GameConfig, GameEngine};
use crate::game::state::PlayerId;

/// Log format version.
pub const LOG_VERSION: u8 = 1;

/// What was submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntryKind {
    /// Player action, possibly rejected.
    Action {
        /// Submitting player
        player_id: PlayerId,
        /// The action
        action: Action,
    },
    /// Roster change from the transport.
    Lifecycle {
        /// The event
        event: LifecycleEvent,
    },
}

/// One recorded submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall clock at submission, fed back as `now` on replay
    pub at: DateTime<Utc>,
    /// Submission
    pub kind: LogEntryKind,
    /// Whether the engine accepted it
    pub accepted: bool,
}

/// Everything needed to rebuild a game.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// Format version
    pub version: u8,
    /// Game rules at setup
    pub config: GameConfig,
    /// Roster at setup
    pub roster: Vec<PlayerId>,
    /// RNG seed at setup
    pub seed: u64,
    /// Submissions in arrival order
    pub entries: Vec<LogEntry>,
    /// State hash after the last entry, if recorded
    pub final_hash: Option<StateHash>,
}

impl ActionLog {
    /// Start an empty log.
    pub fn new(config: GameConfig, roster: Vec<PlayerId>, seed: u64) -> Self {
        Self {
            version: LOG_VERSION,
            config,
            roster,
            seed,
            entries: Vec::new(),
            final_hash: None,
        }
    }

    /// Record a player action and its outcome.
    pub fn record_action(&mut self, player_id: PlayerId, action: Action, at: DateTime<Utc>, accepted: bool) {
        self.entries.push(LogEntry {
            at,
            kind: LogEntryKind::Action { player_id, action },
            accepted,
        });
    }

    /// Record a lifecycle event (always accepted).
    pub fn record_event(&mut self, event: LifecycleEvent, at: DateTime<Utc>) {
        self.entries.push(LogEntry {
            at,
            kind: LogEntryKind::Lifecycle { event },
            accepted: true,
        });
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Replay failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// Log written by a different format version.
    #[error("unsupported log version {0}")]
    UnsupportedVersion(u8),

    /// An entry was accepted live but rejected on replay, or the reverse.
    #[error("entry {index} diverged: recorded accepted={recorded}, replayed accepted={replayed}")]
    Diverged {
        /// Entry position
        index: usize,
        /// Outcome in the log
        recorded: bool,
        /// Outcome on replay
        replayed: bool,
    },

    /// Final state differs from the recorded hash.
    #[error("state hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hex of the recorded hash
        expected: String,
        /// Hex of the replayed hash
        actual: String,
    },
}

/// Rebuild the game from a log.
///
/// Returns the engine in its final state. Fails on the first entry whose
/// outcome differs, or if the final hash does not match the recorded one.
pub fn replay(log: &ActionLog) -> Result<GameEngine, ReplayError> {
    if log.version != LOG_VERSION {
        return Err(ReplayError::UnsupportedVersion(log.version));
    }

    let mut engine = GameEngine::setup(
        log.config.clone(),
        log.roster.iter().cloned(),
        DeterministicRng::new(log.seed),
    );

    for (index, entry) in log.entries.iter().enumerate() {
        let replayed = match &entry.kind {
            LogEntryKind::Action { player_id, action } => {
                engine.apply_action(player_id, action, entry.at).is_ok()
            }
            LogEntryKind::Lifecycle { event } => {
                engine.apply_event(event);
                true
            }
        };
        if replayed != entry.accepted {
            return Err(ReplayError::Diverged { index, recorded: entry.accepted, replayed });
        }
    }

    if let Some(expected) = log.final_hash {
        let actual = engine.state().compute_hash();
        if actual != expected {
            return Err(ReplayError::HashMismatch {
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
    }

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::Variant;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    /// Play a short game live, recording as a session would.
    fn play_live(config: GameConfig, seed: u64) -> (GameEngine, ActionLog) {
        let roster: Vec<PlayerId> = vec!["ann".into(), "bo".into()];
        let mut engine = GameEngine::setup(config.clone(), roster.clone(), DeterministicRng::new(seed));
        let mut log = ActionLog::new(config, roster, seed);

        let script: Vec<(&str, Action)> = vec![
            ("ann", Action::roll()),
            ("bo", Action::roll()),
            ("ann", Action::roll()),
            ("ann", Action::EndTurn),
            ("bo", Action::SwitchView { view: crate::game::state::View::CashShop }),
            ("bo", Action::roll()),
            ("bo", Action::roll()),
            ("bo", Action::EndTurn),
            ("ann", Action::roll()),
            ("ann", Action::EndTurn),
        ];

        for (i, (who, action)) in script.into_iter().enumerate() {
            let now = at(i as i64 * 1000);
            if i == 5 {
                let event = LifecycleEvent::PlayerLeft { player_id: "ann".into() };
                engine.apply_event(&event);
                log.record_event(event, now);
            }
            let accepted = engine.apply_action(&who.into(), &action, now).is_ok();
            log.record_action(who.into(), action, now, accepted);
        }

        log.final_hash = Some(engine.state().compute_hash());
        (engine, log)
    }

    #[test]
    fn test_replay_reproduces_hash() {
        let (live, log) = play_live(GameConfig { win_level: 100, ..GameConfig::default() }, 77);
        let replayed = replay(&log).unwrap();
        assert_eq!(replayed.state().compute_hash(), live.state().compute_hash());
        assert_eq!(replayed.seq(), live.seq());
        assert_eq!(replayed.roller(), live.roller());
    }

    #[test]
    fn test_log_contains_rejections() {
        let (_, log) = play_live(GameConfig { win_level: 100, ..GameConfig::default() }, 77);
        // "bo" rolling on "ann"'s turn is always rejected
        assert!(!log.entries[1].accepted);
        assert!(log.entries.iter().any(|e| e.accepted));
    }

    #[test]
    fn test_replay_through_json() {
        let (live, log) = play_live(GameConfig { win_level: 100, ..GameConfig::default() }, 3);
        let restored = ActionLog::from_json(&log.to_json().unwrap()).unwrap();
        let replayed = replay(&restored).unwrap();
        assert_eq!(replayed.state().compute_hash(), live.state().compute_hash());
    }

    #[test]
    fn test_different_seed_detected() {
        let (_, mut log) = play_live(GameConfig { win_level: 100, ..GameConfig::default() }, 77);
        log.seed = 78;
        assert!(matches!(replay(&log), Err(ReplayError::HashMismatch { .. })));
    }

    #[test]
    fn test_tampered_outcome_detected() {
        let (_, mut log) = play_live(GameConfig { win_level: 100, ..GameConfig::default() }, 77);
        log.entries[1].accepted = true;
        assert_eq!(
            replay(&log).unwrap_err(),
            ReplayError::Diverged { index: 1, recorded: true, replayed: false }
        );
    }

    #[test]
    fn test_version_checked() {
        let mut log = ActionLog::new(GameConfig::default(), vec!["a".into()], 1);
        log.version = 9;
        assert_eq!(replay(&log).unwrap_err(), ReplayError::UnsupportedVersion(9));
    }

    #[test]
    fn test_roll_off_replay() {
        let config = GameConfig { variant: Variant::RollOff, win_level: 100, enforce_turn_ownership: true };
        let roster: Vec<PlayerId> = vec!["a".into(), "b".into()];
        let mut engine = GameEngine::setup(config.clone(), roster.clone(), DeterministicRng::new(11));
        let mut log = ActionLog::new(config, roster, 11);

        for (i, (who, slot)) in [("a", 0), ("a", 1), ("b", 1), ("b", 0), ("b", 0)].into_iter().enumerate() {
            let action = Action::roll_slot(slot);
            let accepted = engine.apply_action(&who.into(), &action, at(i as i64)).is_ok();
            log.record_action(who.into(), action, at(i as i64), accepted);
        }
        let first = engine.state().whose_turn.clone().unwrap();
        let accepted = engine.apply_action(&first, &Action::StartGame, at(10)).is_ok();
        log.record_action(first, Action::StartGame, at(10), accepted);
        assert!(accepted);
        log.final_hash = Some(engine.state().compute_hash());

        let replayed = replay(&log).unwrap();
        assert_eq!(replayed.state().game_started_at, Some(at(10)));
        assert_eq!(replayed.state().compute_hash(), engine.state().compute_hash());
    }
}
