//! Event sequence numbers and inclusive sequence ranges

use serde::{Deserialize, Serialize};

/// Position of an event in a document's log.
///
/// Sequences start at 1; 0 denotes the canonical empty state.
pub type Sequence = u64;

/// Inclusive range of sequences affected by a fault or an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceRange {
    pub start: Sequence,
    pub end: Sequence,
}

impl SequenceRange {
    /// Create a range; bounds are swapped if given out of order
    pub fn new(start: Sequence, end: Sequence) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Range covering exactly one sequence
    pub fn single(sequence: Sequence) -> Self {
        Self {
            start: sequence,
            end: sequence,
        }
    }

    pub fn contains(&self, sequence: Sequence) -> bool {
        self.start <= sequence && sequence <= self.end
    }

    /// Number of sequences covered
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A range always covers at least one sequence
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..={}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_normalizes_bounds() {
        let range = SequenceRange::new(9, 3);
        assert_eq!(range.start, 3);
        assert_eq!(range.end, 9);
        assert_eq!(range.len(), 7);
    }

    #[test]
    fn test_range_contains() {
        let range = SequenceRange::new(10, 20);
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));
    }

    #[test]
    fn test_range_display() {
        assert_eq!(SequenceRange::single(4).to_string(), "4");
        assert_eq!(SequenceRange::new(4, 8).to_string(), "4..=8");
    }
}
