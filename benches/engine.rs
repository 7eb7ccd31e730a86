//! Benchmarks for the game engine
//!
//! Measures full bot games through `GameEngine` and log replay.

use chrono::{DateTime, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};

use pig_dice::game::replay::{replay, ActionLog};
use pig_dice::{Action, DeterministicRng, GameConfig, GameEngine, PlayerId};

fn roster(players: usize) -> Vec<PlayerId> {
    (0..players).map(|i| PlayerId::new(format!("bot-{i}"))).collect()
}

/// Play one game with per-bot bank thresholds, recording every action.
fn play(config: &GameConfig, players: usize, seed: u64, thresholds: &[u32]) -> (GameEngine, ActionLog) {
    let ids = roster(players);
    let mut engine = GameEngine::setup(config.clone(), ids.clone(), DeterministicRng::new(seed));
    let mut log = ActionLog::new(config.clone(), ids.clone(), seed);
    let now = DateTime::<Utc>::from_timestamp_millis(0).unwrap_or_default();

    while engine.state().game_over.is_none() {
        let holder = engine.state().whose_turn.clone().unwrap_or_else(|| ids[0].clone());
        let index = ids.iter().position(|id| *id == holder).unwrap_or(0);
        let player = engine.state().get_player(&holder).unwrap();
        let action = if player.last_roll_was_a_one() || player.roll.total() >= thresholds[index] {
            Action::EndTurn
        } else {
            Action::roll()
        };
        let accepted = engine.apply_action(&holder, &action, now).is_ok();
        log.record_action(holder, action, now, accepted);
    }

    log.final_hash = Some(engine.state().compute_hash());
    (engine, log)
}

fn bench_full_game(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_game");
    let config = GameConfig { win_level: 100, ..GameConfig::default() };

    for players in [2, 4] {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let thresholds: Vec<u32> = (0..players).map(|_| rng.gen_range(8..=20)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, &players| {
            b.iter(|| {
                let (engine, _) = play(&config, players, black_box(7), &thresholds);
                black_box(engine.state().compute_hash())
            })
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let config = GameConfig { win_level: 100, ..GameConfig::default() };
    let (_, log) = play(&config, 4, 7, &[10, 12, 14, 16]);

    c.bench_function("replay_4_players", |b| {
        b.iter(|| black_box(replay(black_box(&log)).is_ok()))
    });
}

fn bench_state_hash(c: &mut Criterion) {
    let config = GameConfig { win_level: 100, ..GameConfig::default() };
    let (engine, _) = play(&config, 4, 7, &[10, 12, 14, 16]);

    c.bench_function("compute_hash", |b| {
        b.iter(|| black_box(engine.state().compute_hash()))
    });
}

criterion_group!(benches, bench_full_game, bench_replay, bench_state_hash);
criterion_main!(benches);
