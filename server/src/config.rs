use shared::{
    DEFAULT_MAX_DELAY_FRAMES, DEFAULT_ROOM, DEFAULT_ROOM_CAPACITY, DEFAULT_STEP_INTERVAL_MS,
};
use std::time::Duration;

/// Runtime settings of the coordinator
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to, e.g. `127.0.0.1:3000`
    pub bind_addr: String,
    /// Participants needed to start a match
    pub room_capacity: usize,
    /// Wall-clock time covered by one committed step
    pub step_interval: Duration,
    /// Largest tolerated lag of a command's declared frame
    pub max_delay_frames: u32,
    /// How often the loop polls the clock; should be well below `step_interval`
    pub poll_interval: Duration,
    /// Room used when a join names none
    pub default_room: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            room_capacity: DEFAULT_ROOM_CAPACITY,
            step_interval: Duration::from_millis(DEFAULT_STEP_INTERVAL_MS),
            max_delay_frames: DEFAULT_MAX_DELAY_FRAMES,
            poll_interval: Duration::from_millis(10),
            default_room: DEFAULT_ROOM.to_string(),
        }
    }
}
