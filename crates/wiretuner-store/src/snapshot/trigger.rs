//! Snapshot threshold evaluation

use std::time::{Duration, Instant};
use wiretuner_core_types::Sequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    EventCount,
    Elapsed,
    Forced,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::EventCount => "event_count",
            TriggerReason::Elapsed => "elapsed",
            TriggerReason::Forced => "forced",
        }
    }
}

/// Tracks the last committed snapshot and decides when the next is due
#[derive(Debug, Clone)]
pub struct SnapshotTrigger {
    event_threshold: u64,
    elapsed_threshold: Duration,
    last_sequence: Sequence,
    last_at: Instant,
}

impl SnapshotTrigger {
    pub fn new(event_threshold: u64, elapsed_threshold: Duration, last_sequence: Sequence) -> Self {
        Self {
            event_threshold,
            elapsed_threshold,
            last_sequence,
            last_at: Instant::now(),
        }
    }

    pub fn last_sequence(&self) -> Sequence {
        self.last_sequence
    }

    /// Whether `current` has anything a new snapshot would capture
    pub fn has_new_events(&self, current: Sequence) -> bool {
        current > 0 && current > self.last_sequence
    }

    /// Why a snapshot at `current` is due, if it is
    pub fn reason(&self, current: Sequence, force: bool, now: Instant) -> Option<TriggerReason> {
        if !self.has_new_events(current) {
            return None;
        }
        if force {
            Some(TriggerReason::Forced)
        } else if current - self.last_sequence >= self.event_threshold {
            Some(TriggerReason::EventCount)
        } else if now.saturating_duration_since(self.last_at) >= self.elapsed_threshold {
            Some(TriggerReason::Elapsed)
        } else {
            None
        }
    }

    /// Record a committed snapshot
    pub fn record(&mut self, sequence: Sequence, at: Instant) {
        if sequence >= self.last_sequence {
            self.last_sequence = sequence;
            self.last_at = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> SnapshotTrigger {
        SnapshotTrigger::new(1000, Duration::from_secs(600), 0)
    }

    #[test]
    fn test_event_count_threshold() {
        let t = trigger();
        let now = Instant::now();
        assert_eq!(t.reason(999, false, now), None);
        assert_eq!(t.reason(1000, false, now), Some(TriggerReason::EventCount));
    }

    #[test]
    fn test_elapsed_threshold_needs_new_events() {
        let mut t = trigger();
        let later = Instant::now() + Duration::from_secs(601);
        assert_eq!(t.reason(5, false, later), Some(TriggerReason::Elapsed));

        t.record(5, Instant::now());
        assert_eq!(t.reason(5, false, later), None);
    }

    #[test]
    fn test_forced_with_nothing_new_is_not_due() {
        let mut t = trigger();
        let now = Instant::now();
        assert_eq!(t.reason(0, true, now), None);

        t.record(10, now);
        assert_eq!(t.reason(10, true, now), None);
        assert_eq!(t.reason(11, true, now), Some(TriggerReason::Forced));
    }

    #[test]
    fn test_count_measured_from_last_snapshot() {
        let mut t = trigger();
        let now = Instant::now();
        t.record(1000, now);
        assert_eq!(t.reason(1999, false, now), None);
        assert_eq!(t.reason(2000, false, now), Some(TriggerReason::EventCount));
    }

    #[test]
    fn test_record_ignores_older_sequence() {
        let mut t = trigger();
        t.record(2000, Instant::now());
        t.record(1000, Instant::now());
        assert_eq!(t.last_sequence(), 2000);
    }
}
