//! Fixed-interval step commit for a running match

use log::error;
use shared::{Command, FrameBuffer, ParticipantId, Step};
use std::collections::BTreeMap;
use std::time::Duration;

/// Collects admitted commands and commits them as numbered steps
///
/// Time is fed in as elapsed deltas. The accumulator keeps the remainder of
/// each interval, and at most one step is committed per call, so a late poll
/// is caught up over the following polls instead of firing twice at once.
#[derive(Debug)]
pub struct StepAggregator {
    interval: Duration,
    accumulator: Duration,
    frame: u32,
    pending: BTreeMap<ParticipantId, Vec<Command>>,
    history: FrameBuffer,
}

impl StepAggregator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            accumulator: Duration::ZERO,
            frame: 0,
            pending: BTreeMap::new(),
            history: FrameBuffer::new(),
        }
    }

    /// Frame number of the last committed step (0 before the first)
    pub fn current_frame(&self) -> u32 {
        self.frame
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Appends commands, in arrival order, to the bucket of the step being built
    pub fn push_commands(&mut self, id: &str, commands: impl IntoIterator<Item = Command>) {
        self.pending
            .entry(id.to_string())
            .or_default()
            .extend(commands);
    }

    /// Adds elapsed time and commits a step once a full interval has built up
    pub fn advance(&mut self, elapsed: Duration) -> Option<Step> {
        self.accumulator += elapsed;
        if self.accumulator < self.interval {
            return None;
        }
        self.accumulator -= self.interval;
        Some(self.commit())
    }

    /// Seals the pending bucket as the next step and records it in history
    pub fn commit(&mut self) -> Step {
        self.frame += 1;
        let step = Step::new(self.frame, std::mem::take(&mut self.pending));
        if let Err(e) = self.history.append(step.clone()) {
            error!("Step history out of sync: {}", e);
        }
        step
    }

    /// Every committed step since the last reset
    pub fn history(&self) -> Vec<Step> {
        self.history.history()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Clears counters, bucket and history for a fresh match
    pub fn reset(&mut self) {
        self.frame = 0;
        self.accumulator = Duration::ZERO;
        self.pending.clear();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_no_step_before_interval() {
        let mut aggregator = StepAggregator::new(ms(100));
        assert!(aggregator.advance(ms(40)).is_none());
        assert!(aggregator.advance(ms(59)).is_none());
        let step = aggregator.advance(ms(1)).unwrap();
        assert_eq!(step.frame, 1);
    }

    #[test]
    fn test_frames_strictly_increase_by_one() {
        let mut aggregator = StepAggregator::new(ms(100));
        let jitter = [13, 97, 120, 3, 250, 66, 101, 99, 1, 180];
        let mut frames = Vec::new();
        for _ in 0..20 {
            for dt in jitter {
                if let Some(step) = aggregator.advance(ms(dt)) {
                    frames.push(step.frame);
                }
            }
        }
        for pair in frames.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        assert_eq!(frames[0], 1);
        assert_eq!(aggregator.history().len(), frames.len());
    }

    #[test]
    fn test_remainder_carries_forward() {
        let mut aggregator = StepAggregator::new(ms(100));
        // 10 polls of 35ms = 350ms, which holds exactly 3 intervals
        let fired = (0..10)
            .filter(|_| aggregator.advance(ms(35)).is_some())
            .count();
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_late_poll_caught_up_one_step_per_call() {
        let mut aggregator = StepAggregator::new(ms(100));
        assert!(aggregator.advance(ms(350)).is_some());
        assert!(aggregator.advance(ms(0)).is_some());
        assert!(aggregator.advance(ms(0)).is_some());
        assert!(aggregator.advance(ms(0)).is_none());
        assert_eq!(aggregator.current_frame(), 3);
    }

    #[test]
    fn test_bucket_snapshot_and_clear() {
        let mut aggregator = StepAggregator::new(ms(100));
        aggregator.push_commands("B", [Command::Up]);
        aggregator.push_commands("A", [Command::Left]);
        aggregator.push_commands("A", [Command::Right, Command::Stop]);
        assert_eq!(aggregator.pending_len(), 4);

        let step = aggregator.advance(ms(100)).unwrap();
        assert_eq!(
            step.ctrls["A"],
            vec![Command::Left, Command::Right, Command::Stop]
        );
        assert_eq!(step.ctrls["B"], vec![Command::Up]);
        assert_eq!(aggregator.pending_len(), 0);

        let next = aggregator.advance(ms(100)).unwrap();
        assert_eq!(next.frame, 2);
        assert!(next.ctrls.is_empty());
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let mut aggregator = StepAggregator::new(ms(100));
        aggregator.advance(ms(100));
        aggregator.advance(ms(150));
        aggregator.push_commands("A", [Command::Up]);
        aggregator.reset();

        assert_eq!(aggregator.current_frame(), 0);
        assert!(aggregator.history().is_empty());
        assert_eq!(aggregator.pending_len(), 0);
        // Leftover accumulator is gone too
        assert!(aggregator.advance(ms(60)).is_none());
        assert_eq!(aggregator.advance(ms(40)).unwrap().frame, 1);
    }
}
