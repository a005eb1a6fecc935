//! Admission control for incoming player commands

use crate::aggregator::StepAggregator;
use shared::Command;
use thiserror::Error;

/// Why a command batch was not admitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("declared frame {declared} is more than {max} behind server frame {current}")]
    TooFarBehind { declared: u32, current: u32, max: u32 },

    #[error("sender is not an online participant")]
    UnknownSender,

    #[error("match has not started")]
    NotStarted,
}

/// Filters command batches before they reach the step bucket
#[derive(Debug, Clone, Copy)]
pub struct AdmissionGate {
    max_delay_frames: u32,
}

impl AdmissionGate {
    pub fn new(max_delay_frames: u32) -> Self {
        Self { max_delay_frames }
    }

    pub fn max_delay_frames(&self) -> u32 {
        self.max_delay_frames
    }

    /// Checks the declared frame against the server frame.
    ///
    /// A lag of exactly `max_delay_frames` is still accepted. Frames ahead of
    /// the server are never rejected here.
    pub fn check_frame(&self, current: u32, declared: u32) -> Result<(), Rejection> {
        if current.saturating_sub(declared) > self.max_delay_frames {
            return Err(Rejection::TooFarBehind {
                declared,
                current,
                max: self.max_delay_frames,
            });
        }
        Ok(())
    }

    /// Admits a command batch into the step currently being built.
    ///
    /// Tolerated late input is folded into the current bucket, never into a
    /// past step: committed steps are immutable. Returns the number of
    /// commands queued.
    pub fn admit(
        &self,
        sender: Option<&str>,
        declared: u32,
        commands: Vec<Command>,
        aggregator: &mut StepAggregator,
    ) -> Result<usize, Rejection> {
        let sender = sender.ok_or(Rejection::UnknownSender)?;
        self.check_frame(aggregator.current_frame(), declared)?;

        let count = commands.len();
        aggregator.push_commands(sender, commands);
        Ok(count)
    }
}
