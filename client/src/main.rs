use clap::Parser;
use client::game::ReconcileConfig;
use client::input::InputCapture;
use client::network::{spawn_network, NetworkEvent};
use client::rendering::{RenderConfig, Renderer};
use client::session::{Session, SessionPhase};
use log::{error, info};
use macroquad::prelude::*;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name to pre-fill in the menu
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "840")]
    height: usize,

    /// Watch instead of playing
    #[arg(long)]
    spectate: bool,

    /// How far behind the server remote entities are drawn, in milliseconds
    #[arg(long, default_value = "100")]
    render_delay: u64,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Blast Arena".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let server_addr: SocketAddr = match args.server.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server address {}: {}", args.server, e);
            return;
        }
    };

    info!("Starting client...");
    info!("Connecting to: {}", server_addr);
    info!("Controls: arrows/WASD to move, Space to drop a bomb");
    info!("Press G to toggle the server position ghost, P to log positions");

    let mut network = match spawn_network(server_addr, args.fake_ping) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start networking: {}", e);
            return;
        }
    };

    let mut session = Session::new(ReconcileConfig {
        render_delay_ms: args.render_delay,
        ..ReconcileConfig::default()
    });
    if let Some(name) = &args.name {
        name.chars().for_each(|c| session.push_char(c));
    }

    let mut capture = InputCapture::new();
    let mut renderer = Renderer::new(args.width, args.height);
    let mut show_server_ghost = false;
    let mut ping_ms = 0;
    let started = Instant::now();

    loop {
        let now_ms = started.elapsed().as_millis() as u64;

        for event in network.drain() {
            match event {
                NetworkEvent::RoundTrip(rtt) => ping_ms = rtt.as_millis() as u64,
                NetworkEvent::Packet(packet) => session.handle_packet(packet, now_ms),
            }
        }

        if session.phase() == SessionPhase::Menu {
            while let Some(c) = get_char_pressed() {
                session.push_char(c);
            }
            if is_key_pressed(KeyCode::Backspace) {
                session.pop_char();
            }

            let request = if args.spectate || is_key_pressed(KeyCode::Tab) {
                session.spectate()
            } else if is_key_pressed(KeyCode::Enter) {
                session.join()
            } else {
                None
            };
            if let Some(packet) = request {
                network.send(packet);
            }
        }

        if session.wants_input() && !capture.is_capturing() {
            capture.start();
        } else if !session.wants_input() && capture.is_capturing() {
            capture.stop(session.moves_mut());
        }

        let toggles = capture.update(session.moves_mut());
        if toggles.server_ghost {
            show_server_ghost = !show_server_ghost;
            info!("Server ghost: {}", show_server_ghost);
        }

        if let Some(packet) = session.frame(now_ms) {
            if !network.send(packet) {
                error!("Network task stopped");
                break;
            }
        }

        let config = RenderConfig {
            client_id: session.client_id(),
            spectating: session.is_spectating(),
            show_server_ghost,
            ping_ms,
            fake_ping_ms: args.fake_ping,
        };
        let phase = session.phase();
        let name = session.name().to_string();
        let rejection = session.rejection().map(str::to_string);
        let connected = config.client_id.is_some();

        let state = session.render(now_ms);
        if toggles.print_positions {
            if let Some(state) = state {
                info!("CLIENT: {:?}", state.me);
                info!("SERVER: {:?}", state.server_me);
            }
        }

        match (phase, state) {
            (SessionPhase::Menu, state) => {
                renderer.render_menu(state, &name, connected, rejection.as_deref(), &config)
            }
            (_, Some(state)) => renderer.render(state, &config),
            (_, None) => clear_background(Color::from_rgba(26, 26, 26, 255)),
        }

        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        next_frame().await;
    }

    // Closing the outgoing channel makes the network task send Disconnect.
    drop(network);
    std::thread::sleep(Duration::from_millis(50));
}
