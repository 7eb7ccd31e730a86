//! Game Logic Module
//!
//! The authoritative engine. 100% deterministic given a seeded roller and
//! caller-supplied timestamps.
//!
//! ## Module Structure
//!
//! - `dice`: Die faces and their resource content
//! - `state`: Game state, player state, leaderboard queries
//! - `action`: Player actions and lifecycle events
//! - `engine`: Validation and state transitions
//! - `rolloff`: Two-phase start ranking
//! - `events`: Game events for subscribers and logs
//! - `replay`: Action log and deterministic replay

pub mod dice;
pub mod state;
pub mod action;
pub mod engine;
pub mod rolloff;
pub mod events;
pub mod replay;

// Re-export key types
pub use action::{Action, LifecycleEvent, DieSlot};
pub use engine::{GameConfig, GameEngine, Variant, EngineError, InvalidActionReason};
pub use events::{GameEvent, GameEventData};
pub use replay::{ActionLog, replay};
pub use rolloff::Elected;
pub use state::{GameState, PlayerState, PlayerId, RollState, View, FinalStandings};
