//! Player commands and the movement directions they decode to

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// A single movement command issued by a participant
///
/// Travels on the wire as its one-byte code; unknown codes fail to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Command {
    Stop = 0,
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
}

/// Heading of an entity, decoded from a [`Command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Stop,
    Up,
    Down,
    Left,
    Right,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Stop,
        Command::Up,
        Command::Down,
        Command::Left,
        Command::Right,
    ];

    /// Wire code of this command
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn direction(self) -> Direction {
        match self {
            Command::Stop => Direction::Stop,
            Command::Up => Direction::Up,
            Command::Down => Direction::Down,
            Command::Left => Direction::Left,
            Command::Right => Direction::Right,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Command::Stop),
            1 => Ok(Command::Up),
            2 => Ok(Command::Down),
            3 => Ok(Command::Left),
            4 => Ok(Command::Right),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command.code()
    }
}

impl Direction {
    /// Unit vector for this heading. Screen coordinates: y grows downward.
    pub fn vector(self) -> (f32, f32) {
        match self {
            Direction::Stop => (0.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }
}
