//! Server network layer: UDP tasks around a single-owner simulation loop

use crate::client_manager::{limit_moves, ClientManager};
use crate::config::ServerConfig;
use crate::game::{Match, MatchEvent, Outbound};
use crate::ticker::{SystemClock, Ticker};
use log::{debug, error, info, warn};
use shared::{decode_packet, encode_packet, Packet, CLIENT_VERSION, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    SendToClient { packet: Packet, client_id: u32 },
}

/// Main server coordinating networking and the match
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: Match,
    ticker: Ticker<SystemClock>,
    config: ServerConfig,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            game: Match::new(config.game.clone()),
            ticker: Ticker::new(config.ticker.clone(), SystemClock::default()),
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle that stops [`Server::run`] when sent [`ServerMessage::Shutdown`].
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_packet(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                let (packet, addr) = match message {
                    GameMessage::SendPacket { packet, addr } => (packet, addr),
                    GameMessage::SendToClient { packet, client_id } => {
                        let addr = clients.read().await.addr_of(client_id);
                        match addr {
                            Some(addr) => (packet, addr),
                            None => continue,
                        }
                    }
                };
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts();

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode_packet(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_to_client(&self, Outbound { client_id, packet }: Outbound) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::SendToClient { packet, client_id })
        {
            error!("Failed to queue packet for client {}: {}", client_id, e);
        }
    }

    /// Turns a datagram into a connection change or a match event
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );
                if client_version != CLIENT_VERSION {
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                let mut clients = self.clients.write().await;
                if let Some(existing_id) = clients.find_client_by_addr(addr) {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    clients.remove_client(&existing_id);
                    self.game.enqueue(MatchEvent::Disconnect {
                        client_id: existing_id,
                    });
                }

                let response = match clients.add_client(addr) {
                    Some(client_id) => Packet::Connected { client_id },
                    None => Packet::Rejected {
                        reason: "Server full".to_string(),
                    },
                };
                drop(clients);
                self.send_packet(response, addr);
            }

            Packet::Ping { timestamp } => {
                if self.clients.write().await.touch(addr).is_some() {
                    self.send_packet(Packet::Pong { timestamp }, addr);
                } else {
                    debug!("Ignoring ping from unknown address {}", addr);
                }
            }

            Packet::Join { .. } | Packet::Spectate | Packet::Input { .. } | Packet::Disconnect => {
                let Some(client_id) = self.clients.write().await.touch(addr) else {
                    debug!("Ignoring packet from unknown address {}", addr);
                    return;
                };
                let event = match packet {
                    Packet::Join { name } => MatchEvent::Join { client_id, name },
                    Packet::Spectate => MatchEvent::Spectate { client_id },
                    Packet::Input { moves } => MatchEvent::Input {
                        client_id,
                        moves: limit_moves(moves, self.config.max_moves_per_packet),
                    },
                    _ => {
                        self.clients.write().await.remove_client(&client_id);
                        MatchEvent::Disconnect { client_id }
                    }
                };
                self.game.enqueue(event);
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Runs every simulation step that is due and ships what it produced
    fn run_due_steps(&mut self) {
        let (outbound, report) = self.ticker.poll(&mut self.game);
        for message in outbound {
            self.send_to_client(message);
        }
        if report.skipped > Duration::ZERO {
            debug!(
                "Tick {}: {} steps, skipped {}ms in {} phase",
                self.ticker.tick(),
                report.steps,
                report.skipped.as_millis(),
                self.game.phase().name()
            );
        }
    }

    /// Sleeps when the next step is at least a millisecond away, yields otherwise
    async fn reschedule(wait: Duration) {
        if wait >= Duration::from_millis(1) {
            tokio::time::sleep(wait).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        self.ticker.start();

        info!(
            "Server started at {}Hz, snapshots every {} steps",
            self.config.ticker.tick_rate, self.config.ticker.broadcast_every
        );

        loop {
            let wait = self.ticker.time_until_next_step();
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game.enqueue(MatchEvent::Disconnect { client_id });
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = Self::reschedule(wait) => {
                    self.run_due_steps();
                },
            }
        }

        Ok(())
    }
}
