//! Headless input source producing random direction commands

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::Command;

/// Emits a random command at a fixed average rate
///
/// Stands in for a keyboard when the client runs without a front end.
pub struct InputManager {
    rng: StdRng,
    commands_per_second: f32,
    accumulator: f32,
    last_command: Option<Command>,
}

impl InputManager {
    pub fn new(commands_per_second: f32) -> Self {
        Self::with_rng(StdRng::from_entropy(), commands_per_second)
    }

    /// Reproducible bot, mainly for tests
    pub fn seeded(seed: u64, commands_per_second: f32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), commands_per_second)
    }

    fn with_rng(rng: StdRng, commands_per_second: f32) -> Self {
        Self {
            rng,
            commands_per_second: commands_per_second.max(0.0),
            accumulator: 0.0,
            last_command: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.commands_per_second > 0.0
    }

    /// Advances the bot clock by `dt` seconds and returns a command when one is due
    pub fn update(&mut self, dt: f32) -> Option<Command> {
        if !self.is_enabled() {
            return None;
        }

        self.accumulator += dt;
        let period = 1.0 / self.commands_per_second;
        if self.accumulator < period {
            return None;
        }
        self.accumulator = (self.accumulator - period).min(period);

        let command = Command::ALL[self.rng.gen_range(0..Command::ALL.len())];
        self.last_command = Some(command);
        Some(command)
    }

    pub fn last_command(&self) -> Option<Command> {
        self.last_command
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new(0.0)
    }
}
