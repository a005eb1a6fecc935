use clap::Parser;
use client::config::ClientConfig;
use client::network::Client;
use log::{error, info};
use shared::LOGIC_FPS;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Account id to join with
    #[arg(short = 'a', long)]
    account: String,

    /// Room to join, the server default when omitted
    #[arg(short = 'r', long)]
    room: Option<String>,

    /// Initial step drain rate in Hz
    #[arg(short = 'f', long, default_value_t = LOGIC_FPS)]
    drain_hz: u32,

    /// Backlog size that triggers catch-up draining
    #[arg(long, default_value = "5")]
    catch_up: usize,

    /// Random bot commands per second, 0 disables the bot
    #[arg(short = 'b', long, default_value = "0")]
    bot_rate: f32,

    /// Client loop period in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ClientConfig {
        server_addr: args.server,
        account_id: args.account,
        room: args.room,
        drain_hz: args.drain_hz,
        catch_up_threshold: args.catch_up,
        bot_rate: args.bot_rate,
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        ..ClientConfig::default()
    };

    info!("Starting client as {}", config.account_id);

    let mut client = Client::connect(config).await?;

    tokio::select! {
        result = client.run() => {
            if let Err(e) = result {
                error!("Client stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving");
        }
    }

    client.leave();
    tokio::time::sleep(Duration::from_millis(100)).await;

    Ok(())
}
