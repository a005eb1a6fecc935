//! Routing of connections to per-room matches

use crate::admission::Rejection;
use crate::config::ServerConfig;
use crate::game::{Match, Outbound, RoomId};
use crate::session::ConnectionId;
use log::{debug, info};
use shared::{Command, Packet};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Owns every running match and knows which room each connection joined
///
/// Matches are created on the first join to a room and dropped again once
/// they are idle. Match output addressed to a whole room is expanded here
/// into per-connection sends.
pub struct MatchManager {
    config: ServerConfig,
    matches: BTreeMap<RoomId, Match>,
    rooms: HashMap<ConnectionId, RoomId>,
}

impl MatchManager {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            matches: BTreeMap::new(),
            rooms: HashMap::new(),
        }
    }

    pub fn join(
        &mut self,
        conn: ConnectionId,
        account_id: &str,
        room: Option<String>,
    ) -> Vec<Outbound> {
        let room = room.unwrap_or_else(|| self.config.default_room.clone());

        if let Some(current) = self.rooms.get(&conn) {
            if *current != room {
                return vec![Outbound::Send {
                    conn,
                    packet: Packet::JoinResult {
                        result: false,
                        message: format!("already in room {}", current),
                    },
                }];
            }
        }

        let config = &self.config;
        let game = self.matches.entry(room.clone()).or_insert_with(|| {
            info!("Opening room {}", room);
            Match::new(room.clone(), config)
        });

        let out = game.join(conn, account_id);
        if game.registry().participant_for(conn).is_some() {
            self.rooms.insert(conn, room.clone());
        }
        self.finish(&room, out)
    }

    /// Handles a disconnect or explicit leave of `conn`
    pub fn leave(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        let Some(room) = self.rooms.remove(&conn) else {
            return Vec::new();
        };
        let out = match self.matches.get_mut(&room) {
            Some(game) => game.leave(conn),
            None => Vec::new(),
        };
        self.finish(&room, out)
    }

    pub fn input(
        &mut self,
        conn: ConnectionId,
        frame: u32,
        commands: Vec<Command>,
    ) -> Result<usize, Rejection> {
        let game = self
            .rooms
            .get(&conn)
            .and_then(|room| self.matches.get_mut(room))
            .ok_or(Rejection::UnknownSender)?;
        game.input(conn, frame, commands)
    }

    /// Advances every running match by `elapsed`
    pub fn tick(&mut self, elapsed: Duration) -> Vec<Outbound> {
        let mut out = Vec::new();
        for game in self.matches.values_mut() {
            out.extend(game.tick(elapsed));
        }
        out
    }

    /// Answer to a client time-sync probe
    pub fn time_sync(client: u64, server_now: u64) -> Packet {
        Packet::TimeSyncReply {
            client,
            server: server_now,
        }
    }

    pub fn get(&self, room: &str) -> Option<&Match> {
        self.matches.get(room)
    }

    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomId> {
        self.rooms.get(&conn)
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// True when `conn` is attached to a room other than `room`
    pub fn attached_elsewhere(&self, conn: ConnectionId, room: &str) -> bool {
        self.rooms.get(&conn).is_some_and(|r| r.as_str() != room)
    }

    /// Forgets closed connections and drops the room if it became idle.
    ///
    /// Room announcements are passed through: by the time a room empties its
    /// members are already detached, so the network loop delivers them to
    /// every open connection not attached to another room.
    fn finish(&mut self, room: &str, out: Vec<Outbound>) -> Vec<Outbound> {
        for action in &out {
            if let Outbound::Close { conn } = action {
                self.rooms.remove(conn);
            }
        }

        if self.matches.get(room).is_some_and(Match::is_idle) {
            debug!("Closing idle room {}", room);
            self.matches.remove(room);
            self.rooms.retain(|_, r| r.as_str() != room);
        }
        out
    }
}
