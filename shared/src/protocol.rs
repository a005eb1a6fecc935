use crate::command::Command;
use crate::step::{ParticipantId, Step};
use serde::{Deserialize, Serialize};

/// Messages exchanged between participants and the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Client -> server
    Join {
        account_id: String,
        room: Option<String>,
    },
    Input {
        frame: u32,
        ctrl: Vec<Command>,
    },
    TimeSync {
        client: u64,
    },
    Leave,

    // Server -> client
    Open {
        connection_id: u32,
        step_interval_ms: u64,
    },
    JoinResult {
        result: bool,
        message: String,
    },
    Start {
        players: Vec<ParticipantId>,
    },
    System {
        message: String,
    },
    Steps {
        steps: Vec<Step>,
    },
    TimeSyncReply {
        client: u64,
        server: u64,
    },
}

impl Packet {
    pub fn system(message: impl Into<String>) -> Self {
        Packet::System {
            message: message.into(),
        }
    }

    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Join { .. } => "join",
            Packet::Input { .. } => "input",
            Packet::TimeSync { .. } => "time_sync",
            Packet::Leave => "leave",
            Packet::Open { .. } => "open",
            Packet::JoinResult { .. } => "join_result",
            Packet::Start { .. } => "start",
            Packet::System { .. } => "system",
            Packet::Steps { .. } => "steps",
            Packet::TimeSyncReply { .. } => "time_sync_reply",
        }
    }
}
