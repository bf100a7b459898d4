//! Performance benchmarks for critical game systems

use client::game::{ClientGameState, ReconcileConfig};
use server::bomb::{detonate, BlastTargets, Bomb};
use server::layout::generate_grid;
use server::player::Player;
use server::powerup::Powerup;
use shared::{
    decode_packet, encode_packet, move_player, tile_to_coord, BlockGrid, Coord, Move, Packet,
    PlayerView, SequencedMove, Snapshot, Tile, SIM_DT,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::time::Instant;

fn diagonal() -> Move {
    Move {
        right: true,
        down: true,
        ..Move::default()
    }
}

/// Benchmarks the shared movement resolver against a full grid
#[test]
fn benchmark_movement_resolution() {
    let grid = generate_grid(&mut StdRng::seed_from_u64(1), 0.7, 0.3);
    let bombs: Vec<Coord> = (0..10)
        .map(|i| tile_to_coord(Tile::new(i, 14 - i)))
        .collect();
    let mv = diagonal();

    let iterations = 100_000;
    let mut position = tile_to_coord(Tile::new(0, 0));
    let start = Instant::now();

    for _ in 0..iterations {
        position = move_player(position, SIM_DT, &mv, &grid, &bombs);
    }

    let duration = start.elapsed();
    println!(
        "Movement resolution: {} iterations in {:?} ({:.2} ns/iter), ended at ({:.1}, {:.1})",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64,
        position.x,
        position.y
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks bomb detonation flood fill on a dense grid
#[test]
fn benchmark_detonation() {
    let iterations = 10_000;
    let mut tiles_hit = 0;
    let start = Instant::now();

    for i in 0..iterations {
        let mut grid = generate_grid(&mut StdRng::seed_from_u64(i), 0.7, 0.3);
        let mut players: BTreeMap<u32, Player> = (0..4)
            .map(|id| {
                let at = tile_to_coord(Tile::new(0, id as i32 * 4));
                (id, Player::new(id, format!("p{}", id), at))
            })
            .collect();
        let mut bombs = vec![Bomb::new(1, tile_to_coord(Tile::new(6, 6)), 0, 6, 0)];
        let mut powerups: Vec<Powerup> = Vec::new();

        let detonation = detonate(
            1,
            Tile::new(6, 6),
            6,
            0,
            BlastTargets {
                players: &mut players,
                bombs: &mut bombs,
                grid: &mut grid,
                powerups: &mut powerups,
            },
        );
        tiles_hit += detonation.explosion.tiles.len();
    }

    let duration = start.elapsed();
    println!(
        "Detonation: {} iterations, {} tiles hit, in {:?} ({:.2} μs/iter)",
        iterations,
        tiles_hit,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot serialization with a crowded match
#[test]
fn benchmark_snapshot_serialization() {
    let grid = generate_grid(&mut StdRng::seed_from_u64(2), 0.7, 0.3);
    let others: Vec<PlayerView> = (0..7)
        .map(|id| PlayerView {
            id,
            name: format!("player{}", id),
            x: 100.0,
            y: 100.0,
            alive: true,
            max_bombs: 3,
            bomb_size: 4,
            sequence: 1000,
        })
        .collect();
    let packet = Packet::Snapshot(Box::new(Snapshot {
        t: 123_456,
        tick_rate: 60.0,
        others,
        blocks: grid.views(),
        ..Snapshot::default()
    }));

    let iterations = 10_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let data = encode_packet(&packet).unwrap();
        bytes = data.len();
        let decoded = decode_packet(&data).unwrap();
        assert!(matches!(decoded, Packet::Snapshot(_)));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations of {} bytes in {:?} ({:.2} μs/iter)",
        iterations,
        bytes,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(bytes < shared::MAX_PACKET_SIZE);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client prediction replaying a backlog of unacknowledged moves
#[test]
fn benchmark_client_prediction() {
    let mut state = ClientGameState::new(ReconcileConfig::default());
    let start_at = tile_to_coord(Tile::new(0, 0));
    let me = PlayerView {
        id: 1,
        name: "me".to_string(),
        x: start_at.x,
        y: start_at.y,
        alive: true,
        max_bombs: 1,
        bomb_size: 2,
        sequence: 0,
    };
    state.add_snapshot(
        Snapshot {
            t: 0,
            me: Some(me),
            blocks: BlockGrid::with_pillars().views(),
            ..Snapshot::default()
        },
        0,
    );
    let moves: Vec<SequencedMove> = (1..=30)
        .map(|sequence| SequencedMove {
            sequence,
            mv: diagonal(),
        })
        .collect();
    state.add_local_moves(&moves);

    let frames = 1_000;
    let start = Instant::now();

    for frame in 0..frames {
        assert!(state.update(frame).is_some());
    }

    let duration = start.elapsed();
    println!(
        "Client prediction: {} frames replaying {} moves in {:?} ({:.2} μs/frame)",
        frames,
        moves.len(),
        duration,
        duration.as_micros() as f64 / frames as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Stress tests a player's move queue with far more input than it keeps
#[test]
fn stress_test_many_moves() {
    let mut player = Player::new(1, "p".to_string(), tile_to_coord(Tile::new(0, 0)));
    let grid = BlockGrid::with_pillars();
    let start = Instant::now();

    for batch in 0..1_000u32 {
        let moves: Vec<SequencedMove> = (0..10)
            .map(|i| SequencedMove {
                sequence: batch * 10 + i + 1,
                mv: diagonal(),
            })
            .collect();
        player.queue_moves(&moves, batch as u64 * 16, 32);
        player.update(batch as u64 * 16, SIM_DT, &grid, &[], 100);
    }

    let duration = start.elapsed();
    println!("Processed 10000 moves in {:?}", duration);

    assert!(player.pending_len() <= 32);
    assert!(duration.as_millis() < 1000);
}
