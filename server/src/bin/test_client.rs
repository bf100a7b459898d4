//! Headless bot: connects, joins the lobby and wanders around dropping bombs.

use clap::Parser;
use log::{info, warn};
use rand::Rng;
use shared::{
    decode_packet, encode_packet, Move, Packet, SequencedMove, CLIENT_VERSION, MAX_PACKET_SIZE,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name of the bot
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// How long to play, in seconds
    #[arg(short = 'd', long, default_value = "30")]
    duration: u64,
}

fn random_move<R: Rng>(rng: &mut R) -> Move {
    let direction = rng.gen_range(0..5);
    Move {
        left: direction == 0,
        right: direction == 1,
        up: direction == 2,
        down: direction == 3,
        bomb: rng.gen_bool(0.05),
    }
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    to: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&encode_packet(packet)?, to).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let server_addr = args.server.parse::<SocketAddr>()?;
    info!("Bot socket bound to {}", socket.local_addr()?);

    send(
        &socket,
        &Packet::Connect {
            client_version: CLIENT_VERSION,
        },
        server_addr,
    )
    .await?;

    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    let (len, _) = socket.recv_from(&mut buffer).await?;
    let client_id = match decode_packet(&buffer[..len])? {
        Packet::Connected { client_id } => client_id,
        other => {
            warn!("Expected Connected but got {:?}", other);
            return Ok(());
        }
    };
    info!("Connected as client {}", client_id);

    send(&socket, &Packet::Join { name: args.name }, server_addr).await?;

    let mut rng = rand::thread_rng();
    let mut sequence = 0;
    let mut current = Move::default();
    let mut ticker = interval(Duration::from_millis(16));
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    while Instant::now() < deadline {
        tokio::select! {
            _ = ticker.tick() => {
                if rng.gen_bool(0.1) {
                    current = random_move(&mut rng);
                }
                sequence += 1;
                let moves = vec![SequencedMove { sequence, mv: current }];
                send(&socket, &Packet::Input { moves }, server_addr).await?;
                current.bomb = false;
            }
            received = socket.recv_from(&mut buffer) => {
                let (len, _) = received?;
                match decode_packet(&buffer[..len]) {
                    Ok(Packet::Snapshot(snapshot)) => {
                        if let Some(message) = &snapshot.waiting_message {
                            info!("t={} {}", snapshot.t, message);
                        } else if let Some(me) = &snapshot.me {
                            info!(
                                "t={} at ({:.0}, {:.0}), seq {}, {} others, {} bombs",
                                snapshot.t, me.x, me.y, me.sequence,
                                snapshot.others.len(), snapshot.bombs.len()
                            );
                        }
                    }
                    Ok(Packet::GameOver) => info!("Blown up, spectating"),
                    Ok(other) => info!("Received {:?}", other),
                    Err(e) => warn!("Failed to decode packet: {}", e),
                }
            }
        }
    }

    send(&socket, &Packet::Disconnect, server_addr).await?;
    sleep(Duration::from_millis(50)).await;
    info!("Bot finished");
    Ok(())
}
