//! Network Layer
//!
//! Hosting glue between a transport and the engine. This layer is
//! **non-deterministic** (wall clock, uuids); all game logic runs through
//! `game/`.

pub mod protocol;
pub mod session;

pub use protocol::{ClientMessage, ServerMessage, StateSnapshot, PlayerSnapshot, GameOverInfo};
pub use session::{GameSession, SessionConfig, SessionError, SessionId, SessionManager, SessionState, SessionUpdate};
