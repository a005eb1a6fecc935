//! The per-room match aggregate
//!
//! A [`Match`] owns everything one room needs: the participant registry, the
//! admission gate, the step aggregator with its history, and the phase. All
//! of its methods are synchronous and return the messages to deliver as
//! [`Outbound`] actions, so the network loop stays the only place that
//! touches connections.

use crate::admission::{AdmissionGate, Rejection};
use crate::aggregator::StepAggregator;
use crate::config::ServerConfig;
use crate::session::{ConnectionId, JoinOutcome, LeaveOutcome, SessionRegistry};
use log::{debug, info};
use shared::{Command, Packet, ParticipantId, Step};
use std::time::Duration;

pub type RoomId = String;

pub const MSG_MATCHING: &str = "matching...";
pub const MSG_RECONNECTING: &str = "reconnecting...";
pub const MSG_KICKED: &str = "signed in elsewhere";
pub const MSG_ROOM_FULL: &str = "room is full";
pub const MSG_GAME_OVER: &str = "game over";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Wait,
    Start,
}

/// Delivery action produced by match logic
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Queue a packet on one connection
    Send { conn: ConnectionId, packet: Packet },
    /// Queue a packet on every open connection not attached to another room
    Announce { room: RoomId, packet: Packet },
    /// Terminate a connection after flushing what is already queued
    Close { conn: ConnectionId },
}

#[derive(Debug)]
pub struct Match {
    room: RoomId,
    phase: MatchPhase,
    registry: SessionRegistry,
    gate: AdmissionGate,
    aggregator: StepAggregator,
}

impl Match {
    pub fn new(room: impl Into<RoomId>, config: &ServerConfig) -> Self {
        Self {
            room: room.into(),
            phase: MatchPhase::Wait,
            registry: SessionRegistry::new(config.room_capacity),
            gate: AdmissionGate::new(config.max_delay_frames),
            aggregator: StepAggregator::new(config.step_interval),
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn current_frame(&self) -> u32 {
        self.aggregator.current_frame()
    }

    pub fn history(&self) -> Vec<Step> {
        self.aggregator.history()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// True when nobody is registered and the room can be dropped
    pub fn is_idle(&self) -> bool {
        self.phase == MatchPhase::Wait && self.registry.is_empty()
    }

    pub fn join(&mut self, conn: ConnectionId, account_id: &str) -> Vec<Outbound> {
        let in_progress = self.phase == MatchPhase::Start;
        let mut out = Vec::new();

        match self.registry.join(account_id, conn, in_progress) {
            JoinOutcome::Reconnected { kicked } => {
                if let Some(old) = kicked {
                    kick(&mut out, old);
                }
                out.push(join_result(conn, true, MSG_RECONNECTING));
                self.broadcast(
                    &mut out,
                    Packet::system(format!("{} reconnected", account_id)),
                    Some(conn),
                );
                out.push(Outbound::Send {
                    conn,
                    packet: Packet::Start {
                        players: self.registry.roster(),
                    },
                });
                let steps = self.aggregator.history();
                info!(
                    "Replaying {} steps to {} in room {}",
                    steps.len(),
                    account_id,
                    self.room
                );
                out.push(Outbound::Send {
                    conn,
                    packet: Packet::Steps { steps },
                });
            }
            JoinOutcome::Joined {
                kicked,
                room_filled,
            } => {
                if let Some(old) = kicked {
                    kick(&mut out, old);
                }
                out.push(join_result(conn, true, MSG_MATCHING));
                if room_filled {
                    self.start(&mut out);
                }
            }
            JoinOutcome::RoomFull => {
                out.push(join_result(conn, false, MSG_ROOM_FULL));
                out.push(Outbound::Close { conn });
            }
            JoinOutcome::AlreadyJoined { existing } => {
                out.push(join_result(
                    conn,
                    false,
                    &format!("already joined as {}", existing),
                ));
            }
        }
        out
    }

    pub fn leave(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        let mut out = Vec::new();
        match self.registry.leave(conn) {
            LeaveOutcome::Unknown => {}
            LeaveOutcome::Departed { id } => {
                self.broadcast(&mut out, Packet::system(format!("{} left the game", id)), None);
            }
            LeaveOutcome::Emptied { id } => {
                info!("Room {} is empty after {} left, game over", self.room, id);
                self.reset();
                out.push(Outbound::Announce {
                    room: self.room.clone(),
                    packet: Packet::system(MSG_GAME_OVER),
                });
            }
        }
        out
    }

    /// Runs a command batch through admission into the current bucket
    pub fn input(
        &mut self,
        conn: ConnectionId,
        declared_frame: u32,
        commands: Vec<Command>,
    ) -> Result<usize, Rejection> {
        if self.phase != MatchPhase::Start {
            return Err(Rejection::NotStarted);
        }
        let sender = self.registry.participant_for(conn).cloned();
        self.gate
            .admit(sender.as_deref(), declared_frame, commands, &mut self.aggregator)
    }

    /// Feeds elapsed time to the aggregator and broadcasts a committed step
    pub fn tick(&mut self, elapsed: Duration) -> Vec<Outbound> {
        let mut out = Vec::new();
        if self.phase != MatchPhase::Start {
            return out;
        }
        if let Some(step) = self.aggregator.advance(elapsed) {
            if step.frame % 100 == 0 {
                debug!(
                    "Room {}: frame {}, {} online",
                    self.room,
                    step.frame,
                    self.registry.online_count()
                );
            }
            self.broadcast(&mut out, Packet::Steps { steps: vec![step] }, None);
        }
        out
    }

    fn start(&mut self, out: &mut Vec<Outbound>) {
        self.aggregator.reset();
        self.phase = MatchPhase::Start;
        let players = self.registry.roster();
        info!("Room {} starting with {:?}", self.room, players);
        self.broadcast(out, Packet::Start { players }, None);
    }

    fn reset(&mut self) {
        self.phase = MatchPhase::Wait;
        self.aggregator.reset();
        self.registry.clear();
    }

    fn broadcast(&self, out: &mut Vec<Outbound>, packet: Packet, exclude: Option<ConnectionId>) {
        for conn in self.registry.online_connections() {
            if Some(conn) == exclude {
                continue;
            }
            out.push(Outbound::Send {
                conn,
                packet: packet.clone(),
            });
        }
    }
}

fn join_result(conn: ConnectionId, result: bool, message: &str) -> Outbound {
    Outbound::Send {
        conn,
        packet: Packet::JoinResult {
            result,
            message: message.to_string(),
        },
    }
}

fn kick(out: &mut Vec<Outbound>, conn: ConnectionId) {
    info!("Kicking connection {}", conn);
    out.push(Outbound::Send {
        conn,
        packet: Packet::system(MSG_KICKED),
    });
    out.push(Outbound::Close { conn });
}

/// Packets queued for `conn`, in order. Test support for inspecting
/// [`Outbound`] lists.
#[doc(hidden)]
pub fn packets_for(out: &[Outbound], conn: ConnectionId) -> Vec<&Packet> {
    out.iter()
        .filter_map(|o| match o {
            Outbound::Send { conn: c, packet } if *c == conn => Some(packet),
            _ => None,
        })
        .collect()
}

/// Participants of a `Start` packet, if `packet` is one. Test support.
#[doc(hidden)]
pub fn start_players(packet: &Packet) -> Option<&[ParticipantId]> {
    match packet {
        Packet::Start { players } => Some(players),
        _ => None,
    }
}
