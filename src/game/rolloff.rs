//! Roll-off Resolution
//!
//! Pure queries over the pre-game roll-off: every player rolls their two
//! personal dice, the sums are ranked, and the highest sum acts first.
//! Sums stay hidden from clients until the first player is known.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::game::state::{GameState, PlayerId};

/// Ranked roll-off players: highest recorded sum first, ties by roster order.
pub fn player_order(state: &GameState) -> Vec<PlayerId> {
    let mut ranked: Vec<(&PlayerId, u32)> = state.decided_roll_sum_by_player_id
        .iter()
        .map(|(id, sum)| (id, *sum))
        .collect();
    // sort_by is stable, BTreeMap iteration is roster order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().map(|(id, _)| id.clone()).collect()
}

/// Head of `player_order`, once every online player has a recorded sum.
pub fn find_first_player(state: &GameState) -> Option<PlayerId> {
    let everyone_rolled = state.players.values()
        .filter(|p| !p.afk)
        .all(|p| state.decided_roll_sum_by_player_id.contains_key(&p.id));

    if !everyone_rolled {
        return None;
    }
    player_order(state).into_iter().next()
}

/// A player's recorded roll-off sum.
pub fn decided_roll_sum(state: &GameState, player_id: &PlayerId) -> Option<u32> {
    state.decided_roll_sum_by_player_id.get(player_id).copied()
}

/// Crystals granted at `startGame`: `n - 1 - rank` for each ranked player.
pub fn starting_bonuses(state: &GameState) -> Vec<(PlayerId, u32)> {
    let order = player_order(state);
    let ranked = order.len();
    order
        .into_iter()
        .enumerate()
        .map(|(rank, id)| (id, (ranked - 1 - rank) as u32))
        .collect()
}

/// Values that become common knowledge once everyone has acted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elected {
    /// Player who acts first, once decided
    pub first_player: Option<PlayerId>,
    /// Seating by roll-off result (empty until decided)
    pub player_order: Vec<PlayerId>,
    /// Every roll-off sum (empty until decided)
    pub roll_sums: BTreeMap<PlayerId, u32>,
}

/// Roll-off results are withheld until the phase resolves.
///
/// Once resolved they stay public, even if a late joiner leaves
/// `find_first_player` pending again.
pub fn elected(state: &GameState) -> Elected {
    match &state.first_player {
        Some(first) => Elected {
            first_player: Some(first.clone()),
            player_order: player_order(state),
            roll_sums: state.decided_roll_sum_by_player_id.clone(),
        },
        None => Elected::default(),
    }
}
