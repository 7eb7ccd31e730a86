//! Game Session Management
//!
//! Hosts one engine per session. Every call takes `&mut self`, and the
//! manager hands sessions out behind a tokio `RwLock`, so one action is
//! fully applied before the next is looked at.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::core::rng::{derive_session_seed, DeterministicRng};
use crate::game::action::{Action, LifecycleEvent};
use crate::game::engine::{EngineError, GameConfig, GameEngine};
use crate::game::events::GameEvent;
use crate::game::replay::ActionLog;
use crate::game::state::PlayerId;
use crate::network::protocol::{
    ClientMessage, ErrorCode, GameOverInfo, ServerError, ServerMessage,
    StateSnapshot, WelcomeInfo,
};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Capacity of the per-session update channel.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Game in progress (including the roll-off).
    Playing,
    /// Someone reached the win level.
    Ended,
}

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Minimum players to set up a game.
    pub min_players: usize,
    /// Maximum seats.
    pub max_players: usize,
    /// Client smoothing hint. Not used by the engine.
    pub input_delay: Duration,
    /// Game rules.
    pub game: GameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_players: 1,
            max_players: 4,
            input_delay: Duration::from_millis(250),
            game: GameConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    ///
    /// Reads `PIG_DICE_MIN_PLAYERS`, `PIG_DICE_MAX_PLAYERS`,
    /// `PIG_DICE_INPUT_DELAY_MS`, plus everything [`GameConfig::from_env`]
    /// reads.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parse = |key: &str| std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok());

        Self {
            min_players: parse("PIG_DICE_MIN_PLAYERS")
                .map(|v| v as usize)
                .unwrap_or(defaults.min_players),
            max_players: parse("PIG_DICE_MAX_PLAYERS")
                .map(|v| v as usize)
                .unwrap_or(defaults.max_players),
            input_delay: parse("PIG_DICE_INPUT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.input_delay),
            game: GameConfig::from_env(),
        }
    }
}

/// Published after every accepted mutation.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// State after the mutation.
    pub snapshot: StateSnapshot,
    /// Events the mutation produced.
    pub events: Vec<GameEvent>,
}

/// One hosted game.
pub struct GameSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Session configuration.
    config: SessionConfig,
    /// The engine.
    engine: GameEngine,
    /// Everything submitted so far.
    log: ActionLog,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// Update broadcast channel.
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl GameSession {
    /// Create a session, deriving the RNG seed from the id and roster.
    pub fn new(id: SessionId, config: SessionConfig, roster: Vec<PlayerId>) -> Result<Self, SessionError> {
        let names: Vec<&str> = roster.iter().map(PlayerId::as_str).collect();
        let seed = derive_session_seed(&id, &names);
        Self::with_seed(id, config, roster, seed)
    }

    /// Create a session with an explicit seed.
    pub fn with_seed(
        id: SessionId,
        config: SessionConfig,
        roster: Vec<PlayerId>,
        seed: u64,
    ) -> Result<Self, SessionError> {
        validate_roster(&config, &roster)?;

        let engine = GameEngine::setup(config.game.clone(), roster.iter().cloned(), DeterministicRng::new(seed));
        let log = ActionLog::new(config.game.clone(), roster, seed);
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        info!(
            session = %uuid::Uuid::from_bytes(id),
            players = log.roster.len(),
            variant = ?config.game.variant,
            win_level = config.game.win_level,
            "session created"
        );

        Ok(Self {
            id,
            config,
            engine,
            log,
            created_at: Utc::now(),
            update_tx,
        })
    }

    /// Submit a player action.
    ///
    /// Rejections are recorded in the action log but publish nothing.
    pub fn submit(
        &mut self,
        player_id: &PlayerId,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let result = self.engine.apply_action(player_id, &action, now);
        self.log.record_action(player_id.clone(), action.clone(), now, result.is_ok());

        match result {
            Ok(events) => {
                debug!(player = %player_id, action = action.name(), events = events.len(), "action accepted");
                if let Some(standings) = &self.engine.state().game_over {
                    info!(
                        session = %uuid::Uuid::from_bytes(self.id),
                        winner = ?standings.winner(),
                        "game over"
                    );
                }
                self.publish(&events, now);
                Ok(events)
            }
            Err(err) => {
                debug!(player = %player_id, action = action.name(), reason = %err, "action rejected");
                Err(err.into())
            }
        }
    }

    /// A player connected. Seats newcomers while there is room.
    pub fn player_joined(&mut self, player_id: &PlayerId, now: DateTime<Utc>) -> Result<Vec<GameEvent>, SessionError> {
        let known = self.engine.state().players.contains_key(player_id);
        if !known && self.engine.state().players.len() >= self.config.max_players {
            warn!(player = %player_id, "join refused, session full");
            return Err(SessionError::SessionFull);
        }

        let event = LifecycleEvent::PlayerJoined { player_id: player_id.clone() };
        let events = self.engine.apply_event(&event);
        self.log.record_event(event, now);

        info!(player = %player_id, reconnect = known, "player joined");
        self.publish(&events, now);
        Ok(events)
    }

    /// A player disconnected. Unknown ids are ignored.
    pub fn player_left(&mut self, player_id: &PlayerId, now: DateTime<Utc>) -> Vec<GameEvent> {
        if !self.engine.state().players.contains_key(player_id) {
            warn!(player = %player_id, "leave for unknown player ignored");
            return Vec::new();
        }

        let event = LifecycleEvent::PlayerLeft { player_id: player_id.clone() };
        let events = self.engine.apply_event(&event);
        self.log.record_event(event, now);

        info!(player = %player_id, "player left");
        self.publish(&events, now);
        events
    }

    /// Translate one client message into engine calls and replies.
    ///
    /// `caller` is the id the transport authenticated. A `Join` naming anyone
    /// else is refused.
    pub fn handle_message(
        &mut self,
        caller: &PlayerId,
        message: ClientMessage,
        now: DateTime<Utc>,
    ) -> Vec<ServerMessage> {
        match message {
            ClientMessage::Join { player_id } if &player_id != caller => {
                warn!(caller = %caller, claimed = %player_id, "join for another player refused");
                vec![ServerMessage::Error(ServerError {
                    code: ErrorCode::InvalidMessage,
                    message: format!("{caller} cannot join as {player_id}"),
                })]
            }

            ClientMessage::Join { player_id } => match self.player_joined(&player_id, now) {
                Ok(_) => vec![
                    ServerMessage::Welcome(WelcomeInfo {
                        session_id: uuid::Uuid::from_bytes(self.id).to_string(),
                        player_id,
                        input_delay_ms: self.config.input_delay.as_millis() as u64,
                        server_version: crate::VERSION.to_string(),
                    }),
                    ServerMessage::State(self.snapshot(now)),
                ],
                Err(err) => vec![error_message(&err)],
            },

            ClientMessage::Action { action } => {
                if !self.engine.state().players.contains_key(caller) {
                    return vec![ServerMessage::Error(ServerError {
                        code: ErrorCode::NotInSession,
                        message: format!("{caller} has not joined"),
                    })];
                }
                match self.submit(caller, action.clone(), now) {
                    Ok(events) => {
                        let mut replies = vec![ServerMessage::Events { events }];
                        if let Some(info) = self.game_over_info() {
                            replies.push(ServerMessage::GameOver(info));
                        }
                        replies
                    }
                    Err(SessionError::Engine(err)) => vec![ServerMessage::Rejected {
                        action,
                        reason: err.reason().clone(),
                    }],
                    Err(err) => vec![error_message(&err)],
                }
            }

            ClientMessage::SyncRequest => vec![ServerMessage::State(self.snapshot(now))],

            ClientMessage::Ping { timestamp } => vec![ServerMessage::Pong {
                timestamp,
                server_time: now.timestamp_millis().max(0) as u64,
            }],

            ClientMessage::Leave => {
                let events = self.player_left(caller, now);
                vec![ServerMessage::Events { events }]
            }
        }
    }

    fn publish(&self, events: &[GameEvent], now: DateTime<Utc>) {
        let update = SessionUpdate {
            snapshot: self.snapshot(now),
            events: events.to_vec(),
        };
        // No subscribers is fine
        let _ = self.update_tx.send(update);
    }

    /// Current snapshot.
    pub fn snapshot(&self, now: DateTime<Utc>) -> StateSnapshot {
        StateSnapshot::from_state(self.engine.state(), self.engine.seq(), now)
    }

    /// Terminal report, once the game is over.
    pub fn game_over_info(&self) -> Option<GameOverInfo> {
        let standings = self.engine.state().game_over.clone()?;
        Some(GameOverInfo {
            session_id: uuid::Uuid::from_bytes(self.id).to_string(),
            standings,
            final_state_hash: hex::encode(self.engine.state().compute_hash()),
        })
    }

    /// Subscribe to session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    /// Get session state.
    pub fn get_state(&self) -> SessionState {
        if self.engine.state().game_over.is_some() {
            SessionState::Ended
        } else {
            SessionState::Playing
        }
    }

    /// The hosted engine.
    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Copy of the action log, sealed with the current state hash.
    pub fn action_log(&self) -> ActionLog {
        let mut log = self.log.clone();
        log.final_hash = Some(self.engine.state().compute_hash());
        log
    }
}

fn validate_roster(config: &SessionConfig, roster: &[PlayerId]) -> Result<(), SessionError> {
    if roster.len() < config.min_players {
        return Err(SessionError::NotEnoughPlayers { min: config.min_players, got: roster.len() });
    }
    if roster.len() > config.max_players {
        return Err(SessionError::TooManyPlayers { max: config.max_players, got: roster.len() });
    }
    let mut seen = std::collections::BTreeSet::new();
    for id in roster {
        if !seen.insert(id) {
            return Err(SessionError::DuplicatePlayer(id.clone()));
        }
    }
    Ok(())
}

fn error_message(err: &SessionError) -> ServerMessage {
    let code = match err {
        SessionError::SessionFull | SessionError::TooManyPlayers { .. } => ErrorCode::SessionFull,
        SessionError::SessionNotFound => ErrorCode::SessionNotFound,
        _ => ErrorCode::InternalError,
    };
    ServerMessage::Error(ServerError { code, message: err.to_string() })
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Roster below the minimum.
    #[error("not enough players: need {min}, got {got}")]
    NotEnoughPlayers {
        /// Configured minimum
        min: usize,
        /// Roster size
        got: usize,
    },

    /// Roster above the maximum.
    #[error("too many players: max {max}, got {got}")]
    TooManyPlayers {
        /// Configured maximum
        max: usize,
        /// Roster size
        got: usize,
    },

    /// Same id twice in the roster.
    #[error("duplicate player {0}")]
    DuplicatePlayer(PlayerId),

    /// No free seat for a new player.
    #[error("Session is full")]
    SessionFull,

    /// Unknown session id.
    #[error("Session not found")]
    SessionNotFound,

    /// Engine rejected the action.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Manages all active sessions.
pub struct SessionManager {
    /// Active sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<GameSession>>>>,
    /// Player to session mapping.
    player_sessions: RwLock<BTreeMap<PlayerId, SessionId>>,
}

impl SessionManager {
    /// Create new session manager.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            player_sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a new session for `roster` and seat everyone in it.
    pub async fn create_session(
        &self,
        config: SessionConfig,
        roster: Vec<PlayerId>,
    ) -> Result<SessionId, SessionError> {
        let id = uuid::Uuid::new_v4().into_bytes();
        let session = GameSession::new(id, config, roster.clone())?;

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(RwLock::new(session)));
        drop(sessions);

        let mut player_sessions = self.player_sessions.write().await;
        for player_id in roster {
            player_sessions.insert(player_id, id);
        }

        Ok(id)
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<RwLock<GameSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Get session for a player.
    pub async fn get_player_session(&self, player_id: &PlayerId) -> Option<Arc<RwLock<GameSession>>> {
        let session_id = {
            let player_sessions = self.player_sessions.read().await;
            player_sessions.get(player_id).copied()
        };
        match session_id {
            Some(id) => self.get_session(&id).await,
            None => None,
        }
    }

    /// Seat a player in an existing session.
    pub async fn join_session(
        &self,
        id: &SessionId,
        player_id: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let session = self.get_session(id).await.ok_or(SessionError::SessionNotFound)?;
        let events = session.write().await.player_joined(&player_id, now)?;

        let mut player_sessions = self.player_sessions.write().await;
        player_sessions.insert(player_id, *id);
        Ok(events)
    }

    /// Remove a session and its player mappings.
    pub async fn remove_session(&self, id: &SessionId) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        drop(sessions);

        let mut player_sessions = self.player_sessions.write().await;
        player_sessions.retain(|_, session_id| session_id != id);
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Drop finished sessions. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut finished = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.read().await.get_state() == SessionState::Ended {
                    finished.push(*id);
                }
            }
        }

        for id in &finished {
            self.remove_session(id).await;
        }
        finished.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::InvalidActionReason;
    use crate::game::events::GameEventData;
    use crate::game::replay::replay;

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| PlayerId::from(*n)).collect()
    }

    fn config(win_level: u32) -> SessionConfig {
        SessionConfig {
            game: GameConfig { win_level, ..GameConfig::default() },
            ..SessionConfig::default()
        }
    }

    fn create_test_session() -> GameSession {
        GameSession::with_seed([0; 16], config(100), ids(&["ann", "bo"]), 77).unwrap()
    }

    #[tokio::test]
    async fn test_roster_bounds() {
        let cfg = SessionConfig { min_players: 2, max_players: 3, ..SessionConfig::default() };

        let err = GameSession::new([0; 16], cfg.clone(), ids(&["a"])).err().unwrap();
        assert_eq!(err, SessionError::NotEnoughPlayers { min: 2, got: 1 });

        let err = GameSession::new([0; 16], cfg.clone(), ids(&["a", "b", "c", "d"])).err().unwrap();
        assert_eq!(err, SessionError::TooManyPlayers { max: 3, got: 4 });

        let err = GameSession::new([0; 16], cfg, ids(&["a", "a"])).err().unwrap();
        assert_eq!(err, SessionError::DuplicatePlayer("a".into()));
    }

    #[tokio::test]
    async fn test_submit_publishes_update() {
        let mut session = create_test_session();
        let mut rx = session.subscribe();

        let events = session.submit(&"ann".into(), Action::roll(), Utc::now()).unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.events, events);
        assert_eq!(update.snapshot.whose_turn, Some("ann".into()));
        assert_eq!(update.snapshot.seq, 1);
    }

    #[tokio::test]
    async fn test_rejection_publishes_nothing() {
        let mut session = create_test_session();
        let mut rx = session.subscribe();
        session.submit(&"ann".into(), Action::roll(), Utc::now()).unwrap();
        rx.recv().await.unwrap();

        let err = session.submit(&"bo".into(), Action::roll(), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Engine(EngineError::InvalidAction(InvalidActionReason::NotYourTurn { .. }))
        ));
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
        // Still logged for replay
        assert_eq!(session.action_log().len(), 2);
    }

    #[tokio::test]
    async fn test_join_respects_capacity() {
        let cfg = SessionConfig { max_players: 2, ..config(100) };
        let mut session = GameSession::new([1; 16], cfg, ids(&["a", "b"])).unwrap();

        let err = session.player_joined(&"c".into(), Utc::now()).unwrap_err();
        assert_eq!(err, SessionError::SessionFull);

        // A seated player can always come back
        session.player_left(&"a".into(), Utc::now());
        let events = session.player_joined(&"a".into(), Utc::now()).unwrap();
        assert_eq!(events[0].data, GameEventData::PlayerReconnected);
    }

    #[tokio::test]
    async fn test_unknown_leave_ignored() {
        let mut session = create_test_session();
        assert!(session.player_left(&"ghost".into(), Utc::now()).is_empty());
        assert_eq!(session.action_log().len(), 0);
    }

    #[tokio::test]
    async fn test_handle_messages() {
        let mut session = create_test_session();
        let now = Utc::now();

        let replies = session.handle_message(&"cy".into(), ClientMessage::Join { player_id: "cy".into() }, now);
        assert!(matches!(replies[0], ServerMessage::Welcome(_)));
        assert!(matches!(replies[1], ServerMessage::State(_)));

        let replies = session.handle_message(&"ann".into(), ClientMessage::Action { action: Action::EndTurn }, now);
        assert!(matches!(
            &replies[0],
            ServerMessage::Rejected { reason: InvalidActionReason::NoTurnEstablished, .. }
        ));

        let replies = session.handle_message(&"ann".into(), ClientMessage::Action { action: Action::roll() }, now);
        assert!(matches!(replies[0], ServerMessage::Events { .. }));

        let replies = session.handle_message(&"zed".into(), ClientMessage::Action { action: Action::roll() }, now);
        assert!(matches!(&replies[0], ServerMessage::Error(e) if e.code == ErrorCode::NotInSession));

        let replies = session.handle_message(&"ann".into(), ClientMessage::Ping { timestamp: 9 }, now);
        assert!(matches!(replies[0], ServerMessage::Pong { timestamp: 9, .. }));

        let replies = session.handle_message(&"bo".into(), ClientMessage::Leave, now);
        assert!(matches!(&replies[0], ServerMessage::Events { events } if events.len() == 1));
        assert_eq!(session.snapshot(now).total_online, 2);
    }

    #[tokio::test]
    async fn test_join_only_as_caller() {
        let mut session = create_test_session();
        let now = Utc::now();
        session.player_left(&"ann".into(), now);
        let logged = session.action_log().len();

        let replies = session.handle_message(&"bo".into(), ClientMessage::Join { player_id: "ann".into() }, now);
        assert!(matches!(&replies[0], ServerMessage::Error(e) if e.code == ErrorCode::InvalidMessage));
        assert!(session.engine().state().get_player(&"ann".into()).unwrap().afk);
        assert_eq!(session.action_log().len(), logged);

        let replies = session.handle_message(&"ann".into(), ClientMessage::Join { player_id: "ann".into() }, now);
        assert!(matches!(&replies[0], ServerMessage::Welcome(info) if info.player_id == PlayerId::from("ann")));
        assert!(!session.engine().state().get_player(&"ann".into()).unwrap().afk);
    }

    #[tokio::test]
    async fn test_game_over_report() {
        let mut session = GameSession::with_seed([2; 16], config(2), ids(&["ann", "bo"]), 77).unwrap();
        let now = Utc::now();
        // Seed 77 opens with a 4
        session.submit(&"ann".into(), Action::roll(), now).unwrap();
        let replies = session.handle_message(&"ann".into(), ClientMessage::Action { action: Action::EndTurn }, now);

        assert_eq!(session.get_state(), SessionState::Ended);
        let ServerMessage::GameOver(info) = &replies[1] else {
            panic!("expected game over, got {:?}", replies);
        };
        assert_eq!(info.standings.winner(), Some(&PlayerId::from("ann")));
        assert_eq!(info.standings.level_of(&"ann".into()), Some(5));
    }

    #[tokio::test]
    async fn test_session_log_replays() {
        let mut session = create_test_session();
        let now = Utc::now();
        for (who, action) in [
            ("ann", Action::roll()),
            ("ann", Action::roll()),
            ("bo", Action::EndTurn),
            ("ann", Action::EndTurn),
            ("bo", Action::roll()),
        ] {
            let _ = session.submit(&who.into(), action, now);
        }
        session.player_left(&"ann".into(), now);

        let replayed = replay(&session.action_log()).unwrap();
        assert_eq!(replayed.state().compute_hash(), session.engine().state().compute_hash());
    }

    #[tokio::test]
    async fn test_session_manager() {
        let manager = SessionManager::new();
        let id = manager.create_session(config(100), ids(&["ann", "bo"])).await.unwrap();
        assert_eq!(manager.session_count().await, 1);

        let session = manager.get_player_session(&"bo".into()).await.unwrap();
        assert_eq!(session.read().await.id, id);

        manager.join_session(&id, "cy".into(), Utc::now()).await.unwrap();
        assert!(manager.get_player_session(&"cy".into()).await.is_some());

        let missing = manager.join_session(&[9; 16], "dee".into(), Utc::now()).await;
        assert_eq!(missing.unwrap_err(), SessionError::SessionNotFound);

        manager.remove_session(&id).await;
        assert_eq!(manager.session_count().await, 0);
        assert!(manager.get_player_session(&"ann".into()).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_finished() {
        let manager = SessionManager::new();
        let id = manager.create_session(config(2), ids(&["ann"])).await.unwrap();
        manager.create_session(config(100), ids(&["bo"])).await.unwrap();

        {
            let session = manager.get_session(&id).await.unwrap();
            let mut session = session.write().await;
            // Any non-bust roll banked reaches level 2
            loop {
                let _ = session.submit(&"ann".into(), Action::roll(), Utc::now());
                let _ = session.submit(&"ann".into(), Action::EndTurn, Utc::now());
                if session.get_state() == SessionState::Ended {
                    break;
                }
            }
        }

        assert_eq!(manager.cleanup().await, 1);
        assert_eq!(manager.session_count().await, 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.min_players, 1);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.input_delay, Duration::from_millis(250));
    }
}
