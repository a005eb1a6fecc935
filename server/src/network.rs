//! Server network layer: connection tasks and the single-writer main loop

use crate::config::ServerConfig;
use crate::game::Outbound;
use crate::manager::MatchManager;
use crate::session::ConnectionId;
use log::{debug, error, info, warn};
use shared::framing::{decode, read_frame, write_packet};
use shared::{Clock, Packet, ProtocolError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        conn: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Packet>,
        close: oneshot::Sender<()>,
    },
    PacketReceived {
        conn: ConnectionId,
        packet: Packet,
    },
    Disconnected {
        conn: ConnectionId,
    },
    Shutdown,
}

/// Main loop's handle on one open connection
struct Connection {
    addr: SocketAddr,
    sender: mpsc::UnboundedSender<Packet>,
    close: oneshot::Sender<()>,
}

/// Coordinator owning every match and every connection
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clock: Arc<dyn Clock>,
    manager: MatchManager,
    connections: HashMap<ConnectionId, Connection>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(
        config: ServerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            manager: MatchManager::new(config.clone()),
            config,
            clock,
            connections: HashMap::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that can stop the loop with [`ServerMessage::Shutdown`]
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns the task accepting new connections
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_id: ConnectionId = 1;
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let conn = next_id;
                        next_id += 1;
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Could not disable Nagle for {}: {}", addr, e);
                        }
                        if !Self::spawn_connection(conn, addr, stream, &server_tx) {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Registers a connection with the main loop, then starts its reader and
    /// writer tasks. Returns false once the main loop is gone.
    fn spawn_connection(
        conn: ConnectionId,
        addr: SocketAddr,
        stream: TcpStream,
        server_tx: &mpsc::UnboundedSender<ServerMessage>,
    ) -> bool {
        let (read_half, write_half) = stream.into_split();
        let (sender, outgoing) = mpsc::unbounded_channel();
        let (close, close_rx) = oneshot::channel();

        if server_tx
            .send(ServerMessage::Connected {
                conn,
                addr,
                sender,
                close,
            })
            .is_err()
        {
            return false;
        }

        tokio::spawn(Self::run_writer(conn, write_half, outgoing));
        tokio::spawn(Self::run_reader(conn, read_half, close_rx, server_tx.clone()));
        true
    }

    async fn run_reader(
        conn: ConnectionId,
        mut read_half: OwnedReadHalf,
        mut close_rx: oneshot::Receiver<()>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        loop {
            tokio::select! {
                _ = &mut close_rx => return,
                frame = read_frame(&mut read_half) => match frame {
                    Ok(payload) => match decode(&payload) {
                        Ok(packet) => {
                            if server_tx.send(ServerMessage::PacketReceived { conn, packet }).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("Dropping malformed packet from connection {}: {}", conn, e),
                    },
                    Err(ProtocolError::Closed) => break,
                    Err(e) => {
                        warn!("Connection {} read error: {}", conn, e);
                        break;
                    }
                },
            }
        }
        let _ = server_tx.send(ServerMessage::Disconnected { conn });
    }

    /// Drains the outgoing queue of one connection. Ends when the main loop
    /// drops the sender, after everything already queued has been written.
    async fn run_writer(
        conn: ConnectionId,
        mut write_half: OwnedWriteHalf,
        mut outgoing: mpsc::UnboundedReceiver<Packet>,
    ) {
        while let Some(packet) = outgoing.recv().await {
            if let Err(e) = write_packet(&mut write_half, &packet).await {
                debug!("Failed to send {} to connection {}: {}", packet.kind(), conn, e);
                return;
            }
        }
        let _ = write_half.shutdown().await;
    }

    fn send(&self, conn: ConnectionId, packet: Packet) {
        if let Some(connection) = self.connections.get(&conn) {
            if connection.sender.send(packet).is_err() {
                debug!("Connection {} writer is gone", conn);
            }
        }
    }

    fn close(&mut self, conn: ConnectionId) {
        if let Some(connection) = self.connections.remove(&conn) {
            info!("Closing connection {} ({})", conn, connection.addr);
            let _ = connection.close.send(());
        }
    }

    /// Sends `packet` to every open connection not attached to another room
    fn announce(&self, room: &str, packet: Packet) {
        let mut targets: Vec<ConnectionId> = self
            .connections
            .keys()
            .copied()
            .filter(|conn| !self.manager.attached_elsewhere(*conn, room))
            .collect();
        targets.sort_unstable();
        debug!(
            "Announcing {} for room {} to {} connections",
            packet.kind(),
            room,
            targets.len()
        );
        for conn in targets {
            self.send(conn, packet.clone());
        }
    }

    fn dispatch(&mut self, out: Vec<Outbound>) {
        for action in out {
            match action {
                Outbound::Send { conn, packet } => self.send(conn, packet),
                Outbound::Close { conn } => self.close(conn),
                Outbound::Announce { room, packet } => self.announce(&room, packet),
            }
        }
    }

    /// Processes one packet from a connection
    fn handle_packet(&mut self, conn: ConnectionId, packet: Packet) {
        match packet {
            Packet::Join { account_id, room } => {
                if account_id.is_empty() {
                    self.send(
                        conn,
                        Packet::JoinResult {
                            result: false,
                            message: "account id required".to_string(),
                        },
                    );
                    return;
                }
                let out = self.manager.join(conn, &account_id, room);
                self.dispatch(out);
            }
            Packet::Input { frame, ctrl } => {
                if let Err(rejection) = self.manager.input(conn, frame, ctrl) {
                    debug!("Dropped input from connection {}: {}", conn, rejection);
                }
            }
            Packet::TimeSync { client } => {
                let reply = MatchManager::time_sync(client, self.clock.now_millis());
                self.send(conn, reply);
            }
            Packet::Leave => {
                let out = self.manager.leave(conn);
                self.dispatch(out);
                self.close(conn);
            }
            other => {
                warn!("Unexpected {} packet from connection {}", other.kind(), conn);
            }
        }
    }

    fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Connected {
                conn,
                addr,
                sender,
                close,
            } => {
                info!("Connection {} opened from {}", conn, addr);
                self.connections
                    .insert(conn, Connection { addr, sender, close });
                self.send(
                    conn,
                    Packet::Open {
                        connection_id: conn,
                        step_interval_ms: self.config.step_interval.as_millis() as u64,
                    },
                );
            }
            ServerMessage::PacketReceived { conn, packet } => {
                if self.connections.contains_key(&conn) {
                    self.handle_packet(conn, packet);
                }
            }
            ServerMessage::Disconnected { conn } => {
                if self.connections.remove(&conn).is_some() {
                    info!("Connection {} closed", conn);
                }
                let out = self.manager.leave(conn);
                self.dispatch(out);
            }
            ServerMessage::Shutdown => {
                info!("Server shutting down");
                return false;
            }
        }
        true
    }

    /// Main server loop: the only place match state is mutated
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_poll = self.clock.now_millis();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    let keep_running = match message {
                        Some(message) => self.handle_message(message),
                        None => false,
                    };
                    if !keep_running {
                        break;
                    }
                },

                _ = poll.tick() => {
                    let now = self.clock.now_millis();
                    let elapsed = Duration::from_millis(now.saturating_sub(last_poll));
                    last_poll = now;

                    let out = self.manager.tick(elapsed);
                    self.dispatch(out);
                },
            }
        }

        Ok(())
    }
}
