//! UDP plumbing for the client. A tokio runtime on its own thread owns the
//! socket; the render loop talks to it through two channels.

use log::{error, info, warn};
use shared::{decode_packet, encode_packet, Packet, CLIENT_VERSION, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, sleep};

/// How often the task pings the server, keeping the connection alive while
/// the player sends no input.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

pub type NetworkResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Packet(Packet),
    /// Round trip of the handshake or a keepalive, fake latency included.
    RoundTrip(Duration),
}

/// The render loop's end of the network task.
pub struct NetworkHandle {
    pub outgoing: UnboundedSender<Packet>,
    pub incoming: UnboundedReceiver<NetworkEvent>,
}

impl NetworkHandle {
    /// Queues a packet; returns false once the network task is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outgoing.send(packet).is_ok()
    }

    /// Everything received since the last call.
    pub fn drain(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Starts the network task on a background thread with its own runtime.
pub fn spawn_network(server_addr: SocketAddr, fake_ping_ms: u64) -> NetworkResult<NetworkHandle> {
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("network".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if let Err(e) = run(server_addr, fake_ping_ms, outgoing_rx, incoming_tx).await {
                    error!("Network task failed: {}", e);
                }
            });
        })?;

    Ok(NetworkHandle {
        outgoing: outgoing_tx,
        incoming: incoming_rx,
    })
}

/// Connects to `server_addr` and shuttles packets until the outgoing channel
/// closes, then says goodbye. Each direction is delayed by half of
/// `fake_ping_ms`. Pongs are consumed here and reported as round trips.
pub async fn run(
    server_addr: SocketAddr,
    fake_ping_ms: u64,
    mut outgoing: UnboundedReceiver<Packet>,
    incoming: UnboundedSender<NetworkEvent>,
) -> NetworkResult<()> {
    let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
    let half_ping = Duration::from_millis(fake_ping_ms / 2);
    info!(
        "Network bound to {}, talking to {}",
        socket.local_addr()?,
        server_addr
    );
    if fake_ping_ms > 0 {
        info!("Simulating {}ms latency", fake_ping_ms);
    }

    let started = Instant::now();
    let mut handshake_pending = true;
    let mut keepalive = interval_at(
        tokio::time::Instant::now() + KEEPALIVE_INTERVAL,
        KEEPALIVE_INTERVAL,
    );
    send_delayed(
        &socket,
        Packet::Connect {
            client_version: CLIENT_VERSION,
        },
        server_addr,
        half_ping,
    );

    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    loop {
        tokio::select! {
            packet = outgoing.recv() => {
                match packet {
                    Some(packet) => send_delayed(&socket, packet, server_addr, half_ping),
                    None => break,
                }
            }

            _ = keepalive.tick() => {
                let timestamp = started.elapsed().as_millis() as u64;
                send_delayed(&socket, Packet::Ping { timestamp }, server_addr, half_ping);
            }

            result = socket.recv_from(&mut buffer) => {
                let (len, from) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        continue;
                    }
                };
                if from != server_addr {
                    warn!("Ignoring datagram from {}", from);
                    continue;
                }
                let packet = match decode_packet(&buffer[..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Failed to decode packet: {}", e);
                        continue;
                    }
                };

                if let Packet::Pong { timestamp } = packet {
                    let sent = Duration::from_millis(timestamp);
                    let rtt = started.elapsed().saturating_sub(sent) + half_ping;
                    let _ = incoming.send(NetworkEvent::RoundTrip(rtt));
                    continue;
                }
                if handshake_pending && matches!(packet, Packet::Connected { .. }) {
                    handshake_pending = false;
                    let rtt = started.elapsed() + half_ping;
                    let _ = incoming.send(NetworkEvent::RoundTrip(rtt));
                }
                forward_delayed(&incoming, NetworkEvent::Packet(packet), half_ping);
            }
        }
    }

    info!("Disconnecting from {}", server_addr);
    let data = encode_packet(&Packet::Disconnect)?;
    socket.send_to(&data, server_addr).await?;
    Ok(())
}

fn send_delayed(socket: &Arc<UdpSocket>, packet: Packet, to: SocketAddr, delay: Duration) {
    let data = match encode_packet(&packet) {
        Ok(data) => data,
        Err(e) => {
            error!("Error encoding packet: {}", e);
            return;
        }
    };
    let socket = Arc::clone(socket);
    tokio::spawn(async move {
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if let Err(e) = socket.send_to(&data, to).await {
            error!("Error sending packet: {}", e);
        }
    });
}

fn forward_delayed(incoming: &UnboundedSender<NetworkEvent>, event: NetworkEvent, delay: Duration) {
    if delay.is_zero() {
        let _ = incoming.send(event);
        return;
    }
    let incoming = incoming.clone();
    tokio::spawn(async move {
        sleep(delay).await;
        let _ = incoming.send(event);
    });
}
