//! Committed lockstep steps and the ordered log that holds them

use crate::command::Command;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Externally supplied account identity of a participant
pub type ParticipantId = String;

/// One committed unit of server-authoritative time
///
/// `ctrls` is keyed by participant id in a `BTreeMap` so that every peer
/// iterates the commands in the same lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub frame: u32,
    pub ctrls: BTreeMap<ParticipantId, Vec<Command>>,
}

impl Step {
    pub fn new(frame: u32, ctrls: BTreeMap<ParticipantId, Vec<Command>>) -> Self {
        Self { frame, ctrls }
    }

    pub fn empty(frame: u32) -> Self {
        Self::new(frame, BTreeMap::new())
    }

    /// Total number of commands across all participants
    pub fn command_count(&self) -> usize {
        self.ctrls.values().map(Vec::len).sum()
    }
}

/// Ordered log of steps
///
/// Frames must arrive strictly increasing by exactly one. The server only
/// appends and hands out the full history for reconnect replay; the client
/// appends received steps and drains them oldest-first.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    steps: VecDeque<Step>,
    last_frame: u32,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step, rejecting any frame that is not `last_frame + 1`
    pub fn append(&mut self, step: Step) -> Result<(), ProtocolError> {
        let expected = self.last_frame + 1;
        if step.frame != expected {
            return Err(ProtocolError::FrameOrder {
                expected,
                got: step.frame,
            });
        }
        self.last_frame = step.frame;
        self.steps.push_back(step);
        Ok(())
    }

    /// Removes and returns the oldest buffered step
    pub fn pop_front(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    /// Copy of every buffered step, oldest first
    pub fn history(&self) -> Vec<Step> {
        self.steps.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Highest frame ever appended since the last clear (0 if none)
    pub fn last_frame(&self) -> u32 {
        self.last_frame
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.last_frame = 0;
    }
}
