use shared::LOGIC_FPS;
use std::time::Duration;

/// Runtime settings of one participant
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator address, e.g. `127.0.0.1:3000`
    pub server_addr: String,
    pub account_id: String,
    /// Room to join; `None` lets the server pick its default room
    pub room: Option<String>,
    /// Logical steps per second; the simulation delta is `1 / logic_fps`
    pub logic_fps: u32,
    /// Initial step drain rate in Hz
    pub drain_hz: u32,
    /// Period of the client loop
    pub tick_interval: Duration,
    pub time_sync_interval: Duration,
    /// Backlog above which draining switches to the maximum rate
    pub catch_up_threshold: usize,
    /// Random commands per second emitted by the bot, 0 to disable
    pub bot_rate: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            account_id: "player".to_string(),
            room: None,
            logic_fps: LOGIC_FPS,
            drain_hz: LOGIC_FPS,
            tick_interval: Duration::from_millis(16),
            time_sync_interval: Duration::from_millis(250),
            catch_up_threshold: 5,
            bot_rate: 0.0,
        }
    }
}

impl ClientConfig {
    /// Seconds advanced by one logical step
    pub fn step_dt(&self) -> f32 {
        1.0 / self.logic_fps.max(1) as f32
    }

    pub fn bot_enabled(&self) -> bool {
        self.bot_rate > 0.0
    }
}
