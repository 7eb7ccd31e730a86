//! Player Actions and Lifecycle Events
//!
//! The closed set of things that can happen to a game. Actions are sent by a
//! player and may be rejected; lifecycle events come from the hosting
//! transport and are always applied.

use serde::{Serialize, Deserialize};

use crate::game::state::{PlayerId, View};

/// Index of one of a player's personal dice.
pub type DieSlot = usize;

/// Player-initiated action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Roll a die. `which` picks the die during a roll-off.
    RollDie {
        /// Die slot, roll-off only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        which: Option<DieSlot>,
    },
    /// Bank the turn's rolls and pass the turn.
    EndTurn,
    /// Leave the roll-off and begin play (first player only).
    StartGame,
    /// Change the screen the player is looking at.
    SwitchView {
        /// Screen to show.
        view: View,
    },
    /// Open or close the dice roll overlay.
    ShowDiceRoll {
        /// Open when true.
        show: bool,
    },
}

impl Action {
    /// Roll without naming a die.
    pub const fn roll() -> Self {
        Action::RollDie { which: None }
    }

    /// Roll a specific die.
    pub const fn roll_slot(which: DieSlot) -> Self {
        Action::RollDie { which: Some(which) }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::RollDie { .. } => "roll_die",
            Action::EndTurn => "end_turn",
            Action::StartGame => "start_game",
            Action::SwitchView { .. } => "switch_view",
            Action::ShowDiceRoll { .. } => "show_dice_roll",
        }
    }

    /// Presentation-only actions never touch gameplay state.
    pub fn is_presentational(&self) -> bool {
        matches!(self, Action::SwitchView { .. } | Action::ShowDiceRoll { .. })
    }
}

/// Transport-initiated roster change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A player connected (first time or reconnect).
    PlayerJoined {
        /// Who connected.
        player_id: PlayerId,
    },
    /// A player disconnected.
    PlayerLeft {
        /// Who disconnected.
        player_id: PlayerId,
    },
}

impl LifecycleEvent {
    /// Player the event concerns.
    pub fn player_id(&self) -> &PlayerId {
        match self {
            LifecycleEvent::PlayerJoined { player_id } | LifecycleEvent::PlayerLeft { player_id } => player_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_json_shape() {
        let json = serde_json::to_string(&Action::roll()).unwrap();
        assert_eq!(json, r#"{"action":"roll_die"}"#);

        let json = serde_json::to_string(&Action::roll_slot(1)).unwrap();
        assert_eq!(json, r#"{"action":"roll_die","which":1}"#);

        let parsed: Action = serde_json::from_str(r#"{"action":"switch_view","view":"cash_shop"}"#).unwrap();
        assert_eq!(parsed, Action::SwitchView { view: View::CashShop });
    }

    #[test]
    fn test_roll_without_slot_parses() {
        let parsed: Action = serde_json::from_str(r#"{"action":"roll_die"}"#).unwrap();
        assert_eq!(parsed, Action::roll());
    }

    #[test]
    fn test_presentational_actions() {
        assert!(Action::ShowDiceRoll { show: true }.is_presentational());
        assert!(!Action::EndTurn.is_presentational());
        assert_eq!(Action::StartGame.name(), "start_game");
    }

    #[test]
    fn test_lifecycle_player_id() {
        let event = LifecycleEvent::PlayerLeft { player_id: "a".into() };
        assert_eq!(event.player_id().as_str(), "a");
    }
}
