use clap::Parser;
use log::info;
use server::config::{MatchConfig, ServerConfig, TickerConfig};
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Send a snapshot every this many steps
    #[arg(long, default_value = "3")]
    broadcast_every: u32,

    /// Steps one poll may run before skipping ahead
    #[arg(long, default_value = "8")]
    max_catch_up: u32,

    /// Maximum number of connected clients
    #[arg(short = 'c', long, default_value = "32")]
    max_clients: usize,

    /// Players needed before the countdown starts
    #[arg(short = 'm', long, default_value = "2")]
    min_players: usize,

    /// Lobby countdown in milliseconds
    #[arg(long, default_value = "3000")]
    countdown_ms: u64,

    /// How long the result stays up, in milliseconds
    #[arg(long, default_value = "5000")]
    done_hold_ms: u64,

    /// How long a player's last move is replayed without new input, in milliseconds
    #[arg(long, default_value = "100")]
    move_staleness_ms: u64,

    /// Fixed seed for block layouts
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            max_clients: self.max_clients,
            client_timeout: Duration::from_secs(5),
            ticker: TickerConfig {
                broadcast_every: self.broadcast_every,
                max_catch_up_steps: self.max_catch_up,
                ..TickerConfig::default()
            },
            game: MatchConfig {
                min_players: self.min_players,
                countdown_ms: self.countdown_ms,
                done_hold_ms: self.done_hold_ms,
                move_staleness_ms: self.move_staleness_ms,
                seed: self.seed,
                ..MatchConfig::default()
            },
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Starting server on {} ({}Hz, {} players to start)",
        config.bind_addr, config.ticker.tick_rate, config.game.min_players
    );

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
