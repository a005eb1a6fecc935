use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use shared::{SystemClock, DEFAULT_MAX_DELAY_FRAMES, DEFAULT_ROOM_CAPACITY};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Participants needed to start a match
    #[arg(short, long, default_value_t = DEFAULT_ROOM_CAPACITY)]
    capacity: usize,

    /// Milliseconds covered by one step
    #[arg(short = 'i', long, default_value = "100")]
    step_interval_ms: u64,

    /// Largest tolerated lag of a command's declared frame
    #[arg(short = 'd', long, default_value_t = DEFAULT_MAX_DELAY_FRAMES)]
    max_delay_frames: u32,

    /// How often the main loop polls the clock, in milliseconds
    #[arg(long, default_value = "10")]
    poll_ms: u64,

    /// Room used when a participant names none
    #[arg(short, long, default_value = "lobby")]
    room: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        room_capacity: args.capacity.max(1),
        step_interval: Duration::from_millis(args.step_interval_ms.max(1)),
        max_delay_frames: args.max_delay_frames,
        poll_interval: Duration::from_millis(args.poll_ms.max(1)),
        default_room: args.room,
    };

    info!("Starting server on {}", config.bind_addr);
    info!(
        "Rooms of {} participants, {}ms steps, max delay {} frames",
        config.room_capacity,
        config.step_interval.as_millis(),
        config.max_delay_frames
    );

    let mut server = Server::bind(config, Arc::new(SystemClock)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
