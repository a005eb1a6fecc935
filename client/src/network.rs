use crate::config::ClientConfig;
use crate::game::ClientGame;
use crate::input::InputManager;
use log::{debug, error, info, warn};
use shared::framing::{decode, read_frame, write_packet};
use shared::{Clock, Packet, ProtocolError, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// What the reader task hands to the client loop
#[derive(Debug)]
pub enum ClientEvent {
    Packet(Packet),
    Disconnected,
}

pub struct Client {
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    game: ClientGame,
    input_manager: InputManager,

    outgoing: mpsc::UnboundedSender<Packet>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    connected: bool,
}

impl Client {
    pub async fn connect(config: ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(
        config: ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", config.server_addr);
        let stream = TcpStream::connect(&config.server_addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(Self::run_writer(write_half, outgoing_rx));
        tokio::spawn(Self::run_reader(read_half, events_tx));

        Ok(Client {
            game: ClientGame::new(&config),
            input_manager: InputManager::new(config.bot_rate),
            config,
            clock,
            outgoing,
            events,
            connected: true,
        })
    }

    async fn run_reader(mut read_half: OwnedReadHalf, events: mpsc::UnboundedSender<ClientEvent>) {
        loop {
            match read_frame(&mut read_half).await {
                Ok(payload) => match decode(&payload) {
                    Ok(packet) => {
                        if events.send(ClientEvent::Packet(packet)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Dropping malformed packet from server: {}", e),
                },
                Err(ProtocolError::Closed) => break,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    break;
                }
            }
        }
        let _ = events.send(ClientEvent::Disconnected);
    }

    async fn run_writer(
        mut write_half: OwnedWriteHalf,
        mut outgoing: mpsc::UnboundedReceiver<Packet>,
    ) {
        while let Some(packet) = outgoing.recv().await {
            if let Err(e) = write_packet(&mut write_half, &packet).await {
                error!("Error sending {}: {}", packet.kind(), e);
                return;
            }
        }
        let _ = write_half.shutdown().await;
    }

    fn send(&self, packet: Packet) {
        if self.outgoing.send(packet).is_err() {
            debug!("Writer task is gone");
        }
    }

    pub fn game(&self) -> &ClientGame {
        &self.game
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Drains everything the reader task has delivered so far
    fn receive_pending(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(ClientEvent::Packet(packet)) => {
                    let now = self.clock.now_millis();
                    for reply in self.game.handle_packet(packet, now) {
                        self.send(reply);
                    }
                }
                Ok(ClientEvent::Disconnected) => {
                    warn!("Disconnected from server");
                    self.connected = false;
                    return;
                }
                Err(_) => return,
            }
        }
    }

    /// One pass of the client loop
    fn tick(&mut self, dt: f32, time_sync_due: bool) {
        self.receive_pending();
        if !self.connected {
            return;
        }

        if let Some(command) = self.input_manager.update(dt) {
            // Blocked input is advisory; the bot simply tries again later
            let _ = self.game.queue_command(command);
        }

        for packet in self.game.tick(dt) {
            self.send(packet);
        }

        if time_sync_due {
            self.send(ClientGame::time_sync_packet(self.clock.now_millis()));
        }

        self.game.update_display(dt);
        for line in self.game.drain_status() {
            info!("[status] {}", line);
        }
    }

    /// Runs until the server closes the connection
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_tick = self.clock.now_millis();
        let mut last_sync = last_tick;
        let sync_every = self.config.time_sync_interval.as_millis() as u64;

        if self.input_manager.is_enabled() {
            info!("Bot input at {:.1} commands/s", self.config.bot_rate);
        }

        while self.connected {
            tick_interval.tick().await;

            let now = self.clock.now_millis();
            let dt = Duration::from_millis(now.saturating_sub(last_tick)).as_secs_f32();
            last_tick = now;

            let time_sync_due = now.saturating_sub(last_sync) >= sync_every;
            if time_sync_due {
                last_sync = now;
            }

            self.tick(dt, time_sync_due);
        }

        Ok(())
    }

    /// Asks the server to release our seat
    pub fn leave(&mut self) {
        if self.connected {
            self.send(Packet::Leave);
        }
    }
}
