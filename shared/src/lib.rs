//! Types and logic shared by the lockstep coordinator and its participants:
//! the wire protocol, commands, committed steps, the deterministic simulation
//! and the time utilities both sides rely on.

pub mod clock;
pub mod command;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod simulation;
pub mod step;

pub use clock::{Clock, DelayEstimator, ManualClock, SystemClock};
pub use command::{Command, Direction};
pub use error::ProtocolError;
pub use protocol::Packet;
pub use simulation::{Entity, Simulation};
pub use step::{FrameBuffer, ParticipantId, Step};

pub const WORLD_WIDTH: f32 = 320.0;
pub const WORLD_HEIGHT: f32 = 400.0;
pub const BOX_SIZE: f32 = 20.0;
pub const ENTITY_SPEED: f32 = 100.0;

/// Server step interval in milliseconds
pub const DEFAULT_STEP_INTERVAL_MS: u64 = 100;
/// Largest tolerated gap between the server frame and a command's declared frame
pub const DEFAULT_MAX_DELAY_FRAMES: u32 = 6;
pub const DEFAULT_ROOM_CAPACITY: usize = 2;
pub const DEFAULT_ROOM: &str = "lobby";

/// Client logical step rate; the simulation delta is `1 / LOGIC_FPS` seconds
pub const LOGIC_FPS: u32 = 10;
pub const MIN_DRAIN_HZ: u32 = 10;
pub const MAX_DRAIN_HZ: u32 = 120;

pub const DELAY_SAMPLE_WINDOW: usize = 20;
