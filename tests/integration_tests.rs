//! Integration tests across the server, client and shared crates
//!
//! These tests drive whole matches through the ticker, run the client's
//! prediction against server snapshots and talk real UDP.

use assert_approx_eq::assert_approx_eq;
use client::game::{ClientGameState, ReconcileConfig};
use server::bomb::Bomb;
use server::config::{MatchConfig, ServerConfig, TickerConfig};
use server::game::{ClientId, Match, MatchEvent, Outbound, Phase};
use server::ticker::{ManualClock, Ticker};
use shared::{
    coord_to_tile, distance, tile_to_coord, Block, Cell, Coord, Move, Packet, PlayerView,
    PowerupKind, SequencedMove, Snapshot, Tile, PLAYER_RADIUS, SIM_DT,
};
use std::collections::HashMap;
use std::time::Duration;

/// A match driven by a hand-advanced clock, remembering what each client got.
struct ScriptedMatch {
    game: Match,
    clock: ManualClock,
    ticker: Ticker<ManualClock>,
    latest: HashMap<ClientId, Snapshot>,
    game_over: Vec<ClientId>,
}

impl ScriptedMatch {
    fn new(config: MatchConfig) -> Self {
        let clock = ManualClock::default();
        let mut ticker = Ticker::new(TickerConfig::default(), clock.clone());
        ticker.start();
        Self {
            game: Match::new(config),
            clock,
            ticker,
            latest: HashMap::new(),
            game_over: Vec::new(),
        }
    }

    fn join(&mut self, client_id: ClientId, name: &str) {
        self.game.enqueue(MatchEvent::Join {
            client_id,
            name: name.to_string(),
        });
    }

    /// Advances wall time by `ms` in small slices, polling after each.
    fn run_for(&mut self, ms: u64) {
        let mut left = ms;
        while left > 0 {
            let slice = left.min(10);
            left -= slice;
            self.clock.advance(Duration::from_millis(slice));
            let (outbound, _) = self.ticker.poll(&mut self.game);
            for Outbound { client_id, packet } in outbound {
                match packet {
                    Packet::Snapshot(snapshot) => {
                        self.latest.insert(client_id, *snapshot);
                    }
                    Packet::GameOver => self.game_over.push(client_id),
                    _ => {}
                }
            }
        }
    }

    fn snapshot(&self, client_id: ClientId) -> &Snapshot {
        self.latest.get(&client_id).expect("no snapshot received")
    }

    fn player_position(&mut self, client_id: ClientId) -> Coord {
        self.game
            .playing_mut()
            .expect("round running")
            .players[&client_id]
            .position
    }
}

/// END-TO-END MATCH TESTS
mod match_flow_tests {
    use super::*;

    fn scenario_config() -> MatchConfig {
        MatchConfig {
            min_players: 3,
            countdown_ms: 1000,
            done_hold_ms: 2000,
            block_density: 0.0,
            seed: Some(7),
            ..MatchConfig::default()
        }
    }

    #[test]
    fn three_player_round_from_lobby_to_winner() {
        let mut m = ScriptedMatch::new(scenario_config());

        // Below threshold: the lobby counts the missing players.
        m.join(1, "alice");
        m.join(2, "bob");
        m.run_for(60);
        assert_eq!(
            m.snapshot(1).waiting_message.as_deref(),
            Some("Waiting for 1 more player(s)...")
        );

        // The third join starts the countdown.
        m.join(3, "carol");
        m.run_for(60);
        let message = m.snapshot(3).waiting_message.clone().unwrap();
        assert!(message.starts_with("Game starts in"), "{}", message);
        assert!(matches!(m.game.phase(), Phase::Waiting(_)));

        // Countdown over: three live players on distinct, non-overlapping tiles.
        m.run_for(1100);
        assert!(matches!(m.game.phase(), Phase::Playing(_)));
        let snapshot = m.snapshot(1).clone();
        assert!(snapshot.waiting_message.is_none());
        let mut players: Vec<PlayerView> = snapshot.others.clone();
        players.push(snapshot.me.clone().expect("alice is playing"));
        assert_eq!(players.len(), 3);
        assert!(players.iter().all(|p| p.alive));
        for (i, a) in players.iter().enumerate() {
            for b in &players[i + 1..] {
                assert_ne!(coord_to_tile(a.position()), coord_to_tile(b.position()));
                assert!(distance(&a.position(), &b.position()) >= 2.0 * PLAYER_RADIUS);
            }
        }

        // Alice drops a bomb on her spawn next to a block hiding a powerup,
        // then is moved clear of the blast.
        let spawn = coord_to_tile(m.player_position(1));
        let powerup_tile = spawn.offset(0, 2);
        m.game.playing_mut().unwrap().grid.set(
            powerup_tile,
            Cell::Block(Block::destructible(Some(PowerupKind::BlastSize))),
        );
        m.game.enqueue(MatchEvent::Input {
            client_id: 1,
            moves: vec![SequencedMove {
                sequence: 1,
                mv: Move {
                    bomb: true,
                    ..Move::default()
                },
            }],
        });
        m.run_for(20);
        let round = m.game.playing_mut().unwrap();
        assert_eq!(round.bombs.len(), 1);
        assert_eq!(round.bombs[0].tile(), spawn);
        round.players.get_mut(&1).unwrap().position = tile_to_coord(spawn.offset(2, 2));

        m.run_for(shared::BOMB_FUSE_MS + 100);
        let snapshot = m.snapshot(1).clone();
        assert!(snapshot.bombs.is_empty());
        assert!(!snapshot
            .blocks
            .iter()
            .any(|b| Tile::new(b.row, b.col) == powerup_tile && !b.destroyed));
        let revealed = tile_to_coord(powerup_tile);
        assert!(snapshot.powerups.iter().any(|p| p.kind == PowerupKind::BlastSize
            && (p.x, p.y) == (revealed.x, revealed.y)));
        assert!(matches!(m.game.phase(), Phase::Playing(_)));

        // Blow up bob and carol where they stand.
        for (bomb_id, victim) in [(900, 2), (901, 3)] {
            let at = m.player_position(victim);
            let round = m.game.playing_mut().unwrap();
            round.bombs.push(Bomb::new(bomb_id, at, 0, 1, victim));
        }
        m.run_for(20);

        assert!(matches!(m.game.phase(), Phase::Done(_)));
        assert!(m.game_over.contains(&2));
        assert!(m.game_over.contains(&3));
        assert!(!m.game_over.contains(&1));
        assert_eq!(
            m.snapshot(1).waiting_message.as_deref(),
            Some("alice wins!")
        );

        // After the hold everyone is back in the lobby watching.
        m.run_for(2100);
        match m.game.phase() {
            Phase::Waiting(lobby) => {
                assert!(lobby.players.is_empty());
                assert_eq!(lobby.spectators.len(), 3);
            }
            other => panic!("unexpected phase {}", other.name()),
        }
    }

    #[test]
    fn simulation_time_follows_whole_steps() {
        let mut m = ScriptedMatch::new(scenario_config());
        m.join(1, "alice");
        m.run_for(1010);
        assert_eq!(m.ticker.tick(), 60);
        assert_eq!(m.game.now(), m.ticker.sim_time_ms());
    }
}

/// CLIENT PREDICTION AND INTERPOLATION TESTS
mod client_engine_tests {
    use super::*;

    fn view(id: u32, at: Coord, sequence: u32) -> PlayerView {
        PlayerView {
            id,
            name: format!("p{}", id),
            x: at.x,
            y: at.y,
            alive: true,
            max_bombs: shared::STARTING_BOMBS,
            bomb_size: shared::STARTING_BOMB_SIZE,
            sequence,
        }
    }

    fn snapshot(t: u64, me: Option<PlayerView>, others: Vec<PlayerView>) -> Snapshot {
        Snapshot {
            t,
            tick_rate: 60.0,
            me,
            others,
            ..Snapshot::default()
        }
    }

    #[test]
    fn remote_entity_is_halfway_at_half_ratio() {
        let mut state = ClientGameState::new(ReconcileConfig::default());
        state.add_snapshot(snapshot(0, None, vec![view(2, Coord::new(0.0, 0.0), 0)]), 1_000);
        state.add_snapshot(snapshot(100, None, vec![view(2, Coord::new(100.0, 0.0), 0)]), 1_100);

        // Local 1_150 maps to server time 150, drawn 100ms behind at 50.
        let render = state.update(1_150).unwrap();
        assert_approx_eq!(render.others[0].x, 50.0);
        assert_approx_eq!(render.others[0].y, 0.0);
    }

    #[test]
    fn idle_prediction_converges_toward_server() {
        let config = ReconcileConfig::default();
        let mut state = ClientGameState::new(config);
        let start = tile_to_coord(Tile::new(2, 2));

        state.add_snapshot(snapshot(0, Some(view(1, start, 0)), Vec::new()), 0);
        let right = Move {
            right: true,
            ..Move::default()
        };
        state.add_local_moves(&[SequencedMove { sequence: 1, mv: right }]);
        state.update(0);
        state.add_local_moves(&[SequencedMove {
            sequence: 2,
            mv: Move::default(),
        }]);
        state.update(10);
        let predicted = state.predicted_at(2).unwrap();
        assert_approx_eq!(predicted.x, start.x + shared::PLAYER_SPEED * SIM_DT, 1e-3);

        // The server disagrees by 40 units about where sequence 2 ended up.
        let server = Coord::new(predicted.x, predicted.y + 40.0);
        state.add_snapshot(snapshot(50, Some(view(1, server, 2)), Vec::new()), 50);

        let mut last_error = distance(&predicted, &server);
        for frame in 0..40 {
            let render = state.update(60 + frame).unwrap();
            let error = distance(&render.me.as_ref().unwrap().position(), &server);
            assert!(error <= last_error + 1e-4);
            if last_error >= config.ignore_distance {
                assert!(error < last_error);
            }
            last_error = error;
        }
        assert!(last_error < config.ignore_distance);
        assert!(state.pending_moves().is_empty());
    }

    #[test]
    fn large_desync_snaps() {
        let mut state = ClientGameState::new(ReconcileConfig::default());
        let start = tile_to_coord(Tile::new(2, 2));
        state.add_snapshot(snapshot(0, Some(view(1, start, 0)), Vec::new()), 0);
        state.update(0);

        let far = tile_to_coord(Tile::new(2, 8));
        state.add_snapshot(snapshot(50, Some(view(1, far, 0)), Vec::new()), 50);
        let render = state.update(50).unwrap();
        assert_eq!(render.me.as_ref().unwrap().position(), far);
    }
}

/// NETWORK TESTS
mod network_tests {
    use super::*;
    use client::network::{run, NetworkEvent};
    use client::session::{Session, SessionPhase};
    use server::network::{Server, ServerMessage};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn client_joins_server_lobby_over_udp() {
        let mut config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        config.game.seed = Some(3);
        let mut server = Server::new(config).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel();
        let network = tokio::spawn(run(server_addr, 0, out_rx, in_tx));

        let mut session = Session::new(ReconcileConfig::default());
        let mut now_ms = 0;
        let deadline = Duration::from_secs(3);

        // Handshake, then join once connected.
        while session.client_id().is_none() {
            match timeout(deadline, in_rx.recv()).await.unwrap().unwrap() {
                NetworkEvent::Packet(packet) => session.handle_packet(packet, now_ms),
                NetworkEvent::RoundTrip(rtt) => assert!(rtt < deadline),
            }
        }
        for c in "tester".chars() {
            session.push_char(c);
        }
        out_tx.send(session.join().unwrap()).unwrap();
        assert_eq!(session.phase(), SessionPhase::WaitingRoom);

        let snapshot = loop {
            now_ms += 16;
            let event = timeout(deadline, in_rx.recv()).await.unwrap().unwrap();
            if let NetworkEvent::Packet(packet) = event {
                if let Packet::Snapshot(snapshot) = &packet {
                    let snapshot = (**snapshot).clone();
                    session.handle_packet(packet, now_ms);
                    break snapshot;
                }
            }
        };
        assert_eq!(
            snapshot.waiting_message.as_deref(),
            Some("Waiting for 1 more player(s)...")
        );
        assert_eq!(snapshot.me.map(|me| me.name), Some("tester".to_string()));
        assert_eq!(session.game().snapshot_count(), 1);

        drop(out_tx);
        network.await.unwrap().unwrap();
        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn idle_lobby_client_outlives_inactivity_timeout() {
        let mut config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            client_timeout: Duration::from_millis(2500),
            ..ServerConfig::default()
        };
        config.game.seed = Some(4);
        let mut server = Server::new(config).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(server_addr, 0, out_rx, in_tx));

        let mut session = Session::new(ReconcileConfig::default());
        let deadline = Duration::from_secs(3);
        while session.client_id().is_none() {
            if let NetworkEvent::Packet(packet) =
                timeout(deadline, in_rx.recv()).await.unwrap().unwrap()
            {
                session.handle_packet(packet, 0);
            }
        }
        out_tx.send(session.join().unwrap()).unwrap();

        // The session sends nothing while waiting; only keepalives go out.
        let mut now_ms = 0;
        let idle_until = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut round_trips = 0;
        while tokio::time::Instant::now() < idle_until {
            now_ms += 16;
            assert!(session.frame(now_ms).is_none());
            if let Ok(Some(event)) = timeout(Duration::from_millis(16), in_rx.recv()).await {
                match event {
                    NetworkEvent::Packet(packet) => session.handle_packet(packet, now_ms),
                    NetworkEvent::RoundTrip(_) => round_trips += 1,
                }
            }
        }
        assert!(round_trips >= 3);

        while in_rx.try_recv().is_ok() {}
        let fresh = loop {
            let event = timeout(deadline, in_rx.recv()).await.unwrap().unwrap();
            if let NetworkEvent::Packet(Packet::Snapshot(snapshot)) = event {
                break snapshot;
            }
        };
        assert_eq!(
            fresh.waiting_message.as_deref(),
            Some("Waiting for 1 more player(s)...")
        );
        assert_eq!(fresh.me.as_ref().map(|me| me.id), session.client_id());
        assert_eq!(session.phase(), SessionPhase::WaitingRoom);

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn malformed_datagrams_do_not_stop_the_server() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let mut server = Server::new(config).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(&[0xde, 0xad], server_addr).await.unwrap();
        let connect = shared::encode_packet(&Packet::Connect {
            client_version: shared::CLIENT_VERSION,
        })
        .unwrap();
        socket.send_to(&connect, server_addr).await.unwrap();

        let mut buffer = vec![0u8; shared::MAX_PACKET_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            shared::decode_packet(&buffer[..len]).unwrap(),
            Packet::Connected { .. }
        ));
        control.send(ServerMessage::Shutdown).unwrap();
    }
}
