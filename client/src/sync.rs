//! Client side of the lockstep protocol: step buffering, fixed-rate draining
//! and outgoing command batching

use log::warn;
use shared::{Command, FrameBuffer, Packet, Step, LOGIC_FPS, MAX_DRAIN_HZ, MIN_DRAIN_HZ};
use thiserror::Error;

/// Input attempted while the local simulation lags the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("input blocked: local frame {local_frame} is behind server frame {server_frame}")]
pub struct InputBlocked {
    pub local_frame: u32,
    pub server_frame: u32,
}

/// Tracks received steps and the local frame count of one participant
#[derive(Debug, Clone)]
pub struct ClientSyncState {
    server_frame: u32,
    local_frame: u32,
    unapplied: FrameBuffer,
    outgoing: Vec<Command>,
    drain_hz: u32,
    drain_accumulator: f32,
}

impl ClientSyncState {
    pub fn new() -> Self {
        Self::with_drain_rate(LOGIC_FPS)
    }

    pub fn with_drain_rate(hz: u32) -> Self {
        Self {
            server_frame: 0,
            local_frame: 0,
            unapplied: FrameBuffer::new(),
            outgoing: Vec::new(),
            drain_hz: hz.clamp(MIN_DRAIN_HZ, MAX_DRAIN_HZ),
            drain_accumulator: 0.0,
        }
    }

    /// Buffers a batch of broadcast steps in arrival order.
    ///
    /// Steps that do not continue the buffered sequence are dropped with a
    /// warning instead of corrupting the order.
    pub fn on_receive(&mut self, steps: Vec<Step>) {
        for step in steps {
            let frame = step.frame;
            if let Err(e) = self.unapplied.append(step) {
                warn!("Dropping step {}: {}", frame, e);
            }
        }
        self.server_frame = self.server_frame.max(self.unapplied.last_frame());
    }

    /// Pops the oldest unapplied step
    pub fn drain_one_step(&mut self) -> Option<Step> {
        self.unapplied.pop_front()
    }

    /// Feeds `dt` seconds into the drain clock and releases at most one step
    /// once a full drain period has elapsed
    pub fn poll_drain(&mut self, dt: f32) -> Option<Step> {
        let period = self.drain_period();
        self.drain_accumulator += dt;
        if self.drain_accumulator < period {
            return None;
        }

        match self.drain_one_step() {
            Some(step) => {
                self.drain_accumulator -= period;
                // Never let a backlog of time release more than one step per poll
                self.drain_accumulator = self.drain_accumulator.min(period);
                Some(step)
            }
            None => {
                self.drain_accumulator = period;
                None
            }
        }
    }

    /// Queues a command for the next flush unless the local simulation lags
    /// the server. Being exactly caught up is allowed.
    pub fn queue_command(&mut self, command: Command) -> Result<(), InputBlocked> {
        if self.is_behind() {
            return Err(InputBlocked {
                local_frame: self.local_frame,
                server_frame: self.server_frame,
            });
        }
        self.outgoing.push(command);
        Ok(())
    }

    /// Counts one more locally applied step
    pub fn advance_local_frame(&mut self) {
        self.local_frame += 1;
    }

    /// Takes the queued commands as an input packet tagged with the local frame
    pub fn flush_outgoing(&mut self) -> Option<Packet> {
        if self.outgoing.is_empty() {
            return None;
        }
        Some(Packet::Input {
            frame: self.local_frame,
            ctrl: std::mem::take(&mut self.outgoing),
        })
    }

    /// Changes the drain rate, clamped to the supported range. Resets the
    /// drain clock so the change cannot release two steps in one tick.
    pub fn set_drain_rate(&mut self, hz: u32) {
        self.drain_hz = hz.clamp(MIN_DRAIN_HZ, MAX_DRAIN_HZ);
        self.drain_accumulator = 0.0;
    }

    pub fn drain_rate(&self) -> u32 {
        self.drain_hz
    }

    fn drain_period(&self) -> f32 {
        1.0 / self.drain_hz as f32
    }

    pub fn is_behind(&self) -> bool {
        self.local_frame < self.server_frame
    }

    pub fn server_frame(&self) -> u32 {
        self.server_frame
    }

    pub fn local_frame(&self) -> u32 {
        self.local_frame
    }

    /// Received steps not yet applied
    pub fn backlog(&self) -> usize {
        self.unapplied.len()
    }

    pub fn pending_commands(&self) -> &[Command] {
        &self.outgoing
    }

    /// Forgets all frames and buffers; the drain rate is kept
    pub fn reset(&mut self) {
        self.server_frame = 0;
        self.local_frame = 0;
        self.unapplied.clear();
        self.outgoing.clear();
        self.drain_accumulator = 0.0;
    }
}

impl Default for ClientSyncState {
    fn default() -> Self {
        Self::new()
    }
}
