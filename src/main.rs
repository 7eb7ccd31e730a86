//! Pig Dice Game Server
//!
//! Plays a seeded bot game through a session, then replays its action log
//! and checks that the state hash matches.

use anyhow::{bail, Context};
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pig_dice::{
    Action, PlayerId, Variant, VERSION,
    game::{events::GameEventData, replay::replay},
    network::session::{SessionConfig, SessionManager, SessionState},
};

/// Bots bank once their unbanked total reaches this.
const BANK_THRESHOLD: u32 = 12;

/// Upper bound on submitted actions for the demo.
const MAX_STEPS: usize = 100_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SessionConfig::from_env();
    info!("Pig Dice Server v{}", VERSION);
    info!(
        "Variant: {:?}, win level: {}, seats: {}..={}",
        config.game.variant, config.game.win_level, config.min_players, config.max_players
    );

    demo_game(config).await
}

/// Run one bot game end to end.
async fn demo_game(config: SessionConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Game ===");

    let manager = SessionManager::new();
    let roster: Vec<PlayerId> = ["ada", "bram", "cleo"].into_iter().map(PlayerId::from).collect();
    let variant = config.game.variant;

    let session_id = manager.create_session(config, roster.clone()).await?;
    let session = manager.get_session(&session_id).await.context("session vanished after creation")?;
    info!("Session ID: {}", uuid::Uuid::from_bytes(session_id));

    // Log what subscribers see
    let mut updates = session.read().await.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    for event in update.events {
                        let who = event.player_id.as_ref().map(PlayerId::as_str).unwrap_or("-");
                        match event.data {
                            GameEventData::TurnBanked { gained, new_level } => {
                                info!("{} banks {} -> level {}", who, gained, new_level);
                            }
                            GameEventData::Busted { discarded } => {
                                info!("{} busts, losing {}", who, discarded);
                            }
                            GameEventData::FirstPlayerDecided => info!("{} goes first", who),
                            GameEventData::GameOver { standings } => {
                                info!("Game over! Winner: {:?}", standings.winner());
                            }
                            other => debug!(player = who, event = ?other, "event"),
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Roll-off: everyone rolls both dice, the winner starts the game
    if variant == Variant::RollOff {
        let mut s = session.write().await;
        for id in &roster {
            for slot in 0..2 {
                s.submit(id, Action::roll_slot(slot), Utc::now())?;
            }
        }
        let first = s.engine().state().whose_turn.clone().context("roll-off did not pick a first player")?;
        s.submit(&first, Action::StartGame, Utc::now())?;
    }

    let mut steps = 0;
    loop {
        let mut s = session.write().await;
        if s.get_state() == SessionState::Ended {
            break;
        }
        steps += 1;
        if steps > MAX_STEPS {
            bail!("demo game did not finish within {} actions", MAX_STEPS);
        }

        let state = s.engine().state();
        let holder = state.whose_turn.clone().unwrap_or_else(|| roster[0].clone());
        let player = state.get_player(&holder).context("turn holder missing from roster")?;
        let action = if player.last_roll_was_a_one() || player.roll.total() >= BANK_THRESHOLD {
            Action::EndTurn
        } else {
            Action::roll()
        };
        s.submit(&holder, action, Utc::now())?;
    }

    // Print final results
    info!("=== Game Results ===");
    let (log, hash) = {
        let s = session.read().await;
        if let Some(report) = s.game_over_info() {
            for (place, standing) in report.standings.players.iter().enumerate() {
                info!("#{}: {} - level {}", place + 1, standing.player_id, standing.level);
            }
        }
        (s.action_log(), s.engine().state().compute_hash())
    };
    info!("Actions submitted: {}", log.len());
    info!("Final State Hash: {}", hex::encode(hash));

    // Verify determinism by replaying
    info!("=== Verifying Determinism ===");
    let replayed = replay(&log)?;
    let replay_hash = replayed.state().compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash != replay_hash {
        bail!(
            "DETERMINISM FAILURE: live {} != replay {}",
            hex::encode(hash),
            hex::encode(replay_hash)
        );
    }
    info!("DETERMINISM VERIFIED: Hashes match!");

    drop(session);
    manager.cleanup().await;
    listener.await?;

    Ok(())
}
