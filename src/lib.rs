//! # Pig Dice Game Server
//!
//! Authoritative game state for a turn-based push-your-luck dice game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PIG DICE SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ PRNG, face rolling           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── dice.rs     - Die faces and resource content            │
//! │  ├── state.rs    - Game and player state, queries            │
//! │  ├── action.rs   - Player actions, lifecycle events          │
//! │  ├── engine.rs   - Validation and transitions                │
//! │  ├── rolloff.rs  - Two-phase start ranking                   │
//! │  ├── events.rs   - Engine events                             │
//! │  └── replay.rs   - Action log and replay                     │
//! │                                                              │
//! │  network/        - Hosting glue (non-deterministic)          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Session management                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time reads (callers pass `now`)
//! - All randomness from a seeded Xorshift128+
//!
//! Given the same roster, seed and action log, a game replays to the
//! **identical state hash**.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::action::{Action, LifecycleEvent};
pub use game::engine::{GameConfig, GameEngine, Variant, EngineError, InvalidActionReason, DEFAULT_WIN_LEVEL};
pub use game::state::{GameState, PlayerState, PlayerId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
